use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::middleware::token_auth;
use crate::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub gender: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub auth_token: String,
    pub user_id: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/validate", web::get().to(validate)),
    );
}

/// Salted SHA-256, stored as "<salt>$<hex digest>".
fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = Sha256::digest(format!("{salt}{password}").as_bytes());
    format!("{}${}", salt, hex::encode(digest))
}

fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    let digest = Sha256::digest(format!("{salt}{password}").as_bytes());
    hex::encode(digest) == expected
}

async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> impl Responder {
    let email = body.email.trim();
    let username = body.username.trim();
    if email.is_empty() || username.is_empty() || body.password.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "email, username and password are required"
        }));
    }

    let password_hash = hash_password(&body.password);
    match state.db.create_user(
        email,
        username,
        &password_hash,
        body.gender.as_deref(),
        body.phone_number.as_deref(),
        "local",
    ) {
        Ok(user) => HttpResponse::Created().json(user),
        Err(e) if crate::domain::error::is_unique_violation(&e) => {
            HttpResponse::Conflict().json(serde_json::json!({
                "error": "email or username already registered"
            }))
        }
        Err(e) => {
            log::error!("Failed to create user: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> impl Responder {
    let (user, stored_hash) = match state.db.get_user_with_password(body.email.trim()) {
        Ok(Some(pair)) => pair,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "No account for that email"
            }));
        }
        Err(e) => {
            log::error!("Login lookup failed: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    if !verify_password(&body.password, &stored_hash) {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Incorrect password"
        }));
    }

    let token = match state.db.get_or_create_token(&user.id) {
        Ok(t) => t,
        Err(e) => {
            log::error!("Failed to issue token: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };
    if let Err(e) = state.db.touch_last_login(&user.id) {
        log::warn!("Failed to record last login for {}: {}", user.id, e);
    }

    HttpResponse::Ok().json(LoginResponse {
        auth_token: token.token,
        user_id: user.id,
    })
}

async fn validate(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    match token_auth::authed_user(&state, &req) {
        Ok(user) => HttpResponse::Ok().json(serde_json::json!({
            "valid": true,
            "user_id": user.id
        })),
        Err(resp) => resp,
    }
}
