// Token authentication helpers.
// Controllers call these directly on protected routes; the bearer token is
// resolved to its owning user through the auth_tokens table.

use actix_web::{HttpRequest, HttpResponse};

use crate::models::User;
use crate::AppState;

pub fn extract_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim_start_matches("Bearer ").to_string())
}

/// Resolve the request's bearer token to an active user, or produce the
/// error response the controller should return as-is.
pub fn authed_user(state: &AppState, req: &HttpRequest) -> Result<User, HttpResponse> {
    let token = extract_token(req).ok_or_else(|| {
        HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "No authorization token provided"
        }))
    })?;

    match state.db.get_user_by_token(&token) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid token"
        }))),
        Err(e) => {
            log::error!("Token validation error: {}", e);
            Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            })))
        }
    }
}

/// Staff gate for admin-only routes.
pub fn require_staff(user: &User) -> Result<(), HttpResponse> {
    if user.is_staff {
        Ok(())
    } else {
        Err(HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Staff access required"
        })))
    }
}
