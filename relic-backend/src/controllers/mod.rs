pub mod artifacts;
pub mod auth;
pub mod feeds;
pub mod health;
pub mod models3d;
pub mod users;

use actix_web::HttpResponse;

use crate::domain::DomainError;

/// Translate a domain error into the response a handler returns. The core
/// itself never sees HTTP.
pub(crate) fn domain_error_response(err: DomainError) -> HttpResponse {
    match err {
        DomainError::InvalidArgument(msg) => {
            HttpResponse::BadRequest().json(serde_json::json!({ "error": msg }))
        }
        DomainError::Conflict(msg) => {
            HttpResponse::Conflict().json(serde_json::json!({ "error": msg }))
        }
        DomainError::NotFound(msg) => {
            HttpResponse::NotFound().json(serde_json::json!({ "error": msg }))
        }
        DomainError::Storage(e) => {
            log::error!("Storage error: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}
