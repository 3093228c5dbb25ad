use actix_cors::Cors;
use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

mod config;
mod controllers;
mod db;
mod domain;
mod middleware;
mod models;
mod storage;

use config::Config;
use db::Database;
use storage::MediaStore;

pub struct AppState {
    pub db: Arc<Database>,
    pub media: Arc<MediaStore>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;
    let media_root = config.media_root.clone();

    log::info!("Initializing database at {}", config.database_url);
    let db = Database::new(&config.database_url).expect("Failed to initialize database");
    let db = Arc::new(db);

    log::info!("Serving media from {}", media_root);
    std::fs::create_dir_all(&media_root).ok();
    let media = Arc::new(MediaStore::new(&media_root, &config.media_url));

    log::info!("Starting relic-backend server on port {}", port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(AppState {
                db: Arc::clone(&db),
                media: Arc::clone(&media),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::auth::config)
            .configure(controllers::users::config)
            .configure(controllers::feeds::config)
            .configure(controllers::models3d::config)
            .configure(controllers::artifacts::config)
            // Uploaded images are served straight from disk
            .service(Files::new("/media", media_root.clone()))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
