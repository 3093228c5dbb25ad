use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::db::UserUpdate;
use crate::domain::lifecycle;
use crate::middleware::token_auth;
use crate::AppState;

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub phone_number: Option<String>,
    pub profile_image: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/users")
            .route("/{user_id}", web::get().to(get_user_info))
            .route("/{user_id}", web::patch().to(update_user_info)),
    );
}

/// User info, with the published-feed counter recounted from ground truth
/// and the rank re-derived before answering.
async fn get_user_info(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = token_auth::authed_user(&state, &req) {
        return resp;
    }
    let user_id = path.into_inner();

    if let Err(e) = lifecycle::recount(&state.db, &user_id) {
        return super::domain_error_response(e);
    }

    match state.db.get_user(&user_id) {
        Ok(Some(user)) => HttpResponse::Ok().json(user),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "User not found"
        })),
        Err(e) => {
            log::error!("Failed to load user {}: {}", user_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

async fn update_user_info(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateUserRequest>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let user_id = path.into_inner();

    // Only the account owner or staff may edit a profile
    if caller.id != user_id && !caller.is_staff {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Not allowed to edit this user"
        }));
    }

    let update = UserUpdate {
        username: body.username.as_deref(),
        email: body.email.as_deref(),
        gender: body.gender.as_deref(),
        phone_number: body.phone_number.as_deref(),
        profile_image: body.profile_image.as_deref(),
    };

    match state.db.update_user(&user_id, &update) {
        Ok(Some(user)) => HttpResponse::Ok().json(user),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "User not found"
        })),
        Err(e) if crate::domain::error::is_unique_violation(&e) => {
            HttpResponse::Conflict().json(serde_json::json!({
                "error": "email or username already taken"
            }))
        }
        Err(e) => {
            log::error!("Failed to update user {}: {}", user_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}
