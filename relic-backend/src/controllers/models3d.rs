use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::db::ModelStatusUpdate;
use crate::domain::model_request;
use crate::middleware::token_auth;
use crate::models::{FileFormat, Model3D, ModelStatus};
use crate::AppState;

#[derive(Deserialize)]
pub struct ModelListQuery {
    /// A status name, or "all". Defaults to completed.
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateModelRequest {
    pub file_format: Option<FileFormat>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateModelStatusRequest {
    pub status: ModelStatus,
    pub model_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub poly_count: Option<i64>,
    pub file_size: Option<i64>,
    pub processing_time: Option<i64>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/models")
            .route("", web::get().to(list_models))
            .route("/{model_id}", web::get().to(get_model))
            .route("/{model_id}/status", web::patch().to(update_model_status)),
    );
    cfg.service(
        web::scope("/api/artifacts/{artifact_id}/models")
            .route("", web::get().to(artifact_models))
            .route("", web::post().to(create_model_request)),
    );
}

fn parse_status_filter(
    raw: Option<&str>,
    is_staff: bool,
) -> Result<Option<ModelStatus>, HttpResponse> {
    let raw = raw.unwrap_or("completed");
    if raw == "all" {
        // Non-staff only ever see completed models
        return Ok(if is_staff {
            None
        } else {
            Some(ModelStatus::Completed)
        });
    }
    match ModelStatus::from_str(raw) {
        Some(status) => Ok(Some(status)),
        None => Err(HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("unknown model status '{raw}'")
        }))),
    }
}

async fn list_models(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ModelListQuery>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let status = match parse_status_filter(query.status.as_deref(), caller.is_staff) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match state.db.list_models(status) {
        Ok(models) => HttpResponse::Ok().json(models),
        Err(e) => {
            log::error!("Failed to list models: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// Model detail with its reconstruction source images. Unfinished models
/// are staff-only.
async fn get_model(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let model_id = path.into_inner();

    let model: Model3D = match state.db.get_model(&model_id) {
        Ok(Some(m)) => m,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Model not found"
            }));
        }
        Err(e) => {
            log::error!("Failed to load model {}: {}", model_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    if model.status != ModelStatus::Completed && !caller.is_staff {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Not allowed to view this model"
        }));
    }

    let source_images = match state.db.list_source_images(&model.id) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to load source images for {}: {}", model.id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    HttpResponse::Ok().json(serde_json::json!({
        "model": model,
        "source_images": source_images,
    }))
}

async fn artifact_models(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let artifact_id = path.into_inner();

    if let Ok(None) = state.db.get_artifact(&artifact_id) {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": "Artifact not found"
        }));
    }

    let status = if caller.is_staff {
        None
    } else {
        Some(ModelStatus::Completed)
    };

    match state.db.list_models_for_artifact(&artifact_id, status) {
        Ok(models) => HttpResponse::Ok().json(models),
        Err(e) => {
            log::error!("Failed to list models for artifact {}: {}", artifact_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// Staff-only: request a 3D reconstruction. At most one pending or
/// processing model per artifact; a busy artifact answers 409.
async fn create_model_request(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<CreateModelRequest>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if let Err(resp) = token_auth::require_staff(&caller) {
        return resp;
    }
    let artifact_id = path.into_inner();

    match model_request::request_model(
        &state.db,
        &artifact_id,
        body.file_format.unwrap_or_default(),
        body.description.as_deref(),
    ) {
        Ok(model) => HttpResponse::Created().json(model),
        Err(e) => super::domain_error_response(e),
    }
}

/// Staff-only: the reconstruction pipeline reports progress and results
/// through this endpoint.
async fn update_model_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateModelStatusRequest>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if let Err(resp) = token_auth::require_staff(&caller) {
        return resp;
    }
    let model_id = path.into_inner();

    let update = ModelStatusUpdate {
        status: body.status,
        model_url: body.model_url.as_deref(),
        thumbnail_url: body.thumbnail_url.as_deref(),
        poly_count: body.poly_count,
        file_size: body.file_size,
        processing_time: body.processing_time,
    };

    match state.db.update_model_status(&model_id, &update) {
        Ok(Some(model)) => HttpResponse::Ok().json(model),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Model not found"
        })),
        Err(e) => {
            log::error!("Failed to update model {}: {}", model_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}
