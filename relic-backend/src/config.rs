use std::env;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub media_root: String,
    pub media_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid number"),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "./.db/relic.db".to_string()),
            media_root: env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string()),
            media_url: env::var("MEDIA_URL").unwrap_or_else(|_| "/media".to_string()),
        }
    }
}
