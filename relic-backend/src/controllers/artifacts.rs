use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::db::ArtifactUpdate;
use crate::middleware::token_auth;
use crate::models::ArtifactStatus;
use crate::AppState;

#[derive(Deserialize)]
pub struct ArtifactListQuery {
    /// A status name, or "all". Defaults to verified.
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateArtifactRequest {
    pub description: Option<String>,
    pub time_period: Option<String>,
    pub estimated_year: Option<String>,
    pub origin_location: Option<String>,
    pub status: Option<ArtifactStatus>,
}

#[derive(Deserialize)]
pub struct FeedPageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/artifacts")
            .route("", web::get().to(list_artifacts))
            .route("/{artifact_id}", web::get().to(get_artifact))
            .route("/{artifact_id}", web::patch().to(update_artifact))
            .route("/{artifact_id}/feeds", web::get().to(artifact_feeds)),
    );
}

/// Artifact listing. Default shows verified records; "all" shows
/// everything except rejected rows unless the caller is staff.
async fn list_artifacts(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ArtifactListQuery>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let status_filter = query.status.as_deref().unwrap_or("verified");
    let result = if status_filter == "all" {
        state.db.list_artifacts(None, caller.is_staff)
    } else {
        match ArtifactStatus::from_str(status_filter) {
            Some(status) => state.db.list_artifacts(Some(status), true),
            None => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": format!("unknown artifact status '{status_filter}'")
                }));
            }
        }
    };

    match result {
        Ok(artifacts) => HttpResponse::Ok().json(artifacts),
        Err(e) => {
            log::error!("Failed to list artifacts: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

async fn get_artifact(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let artifact_id = path.into_inner();

    match state.db.get_artifact(&artifact_id) {
        Ok(Some(artifact)) => {
            // Rejected artifacts are staff-only
            if artifact.status == ArtifactStatus::Rejected && !caller.is_staff {
                return HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "Not allowed to view this artifact"
                }));
            }
            HttpResponse::Ok().json(artifact)
        }
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Artifact not found"
        })),
        Err(e) => {
            log::error!("Failed to load artifact {}: {}", artifact_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// Staff-only edit of descriptive fields and review status.
async fn update_artifact(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateArtifactRequest>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if let Err(resp) = token_auth::require_staff(&caller) {
        return resp;
    }
    let artifact_id = path.into_inner();

    let update = ArtifactUpdate {
        description: body.description.as_deref(),
        time_period: body.time_period.as_deref(),
        estimated_year: body.estimated_year.as_deref(),
        origin_location: body.origin_location.as_deref(),
        status: body.status,
    };

    match state.db.update_artifact(&artifact_id, &update) {
        Ok(Some(artifact)) => HttpResponse::Ok().json(artifact),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Artifact not found"
        })),
        Err(e) => {
            log::error!("Failed to update artifact {}: {}", artifact_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// Feeds linked to one artifact, paginated.
async fn artifact_feeds(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<FeedPageQuery>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let artifact_id = path.into_inner();

    let artifact = match state.db.get_artifact(&artifact_id) {
        Ok(Some(a)) => a,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Artifact not found"
            }));
        }
        Err(e) => {
            log::error!("Failed to load artifact {}: {}", artifact_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };
    if artifact.status == ArtifactStatus::Rejected && !caller.is_staff {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Not allowed to view this artifact"
        }));
    }

    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * page_size;

    let total = match state.db.count_artifact_links(&artifact_id) {
        Ok(t) => t,
        Err(e) => {
            log::error!("Failed to count artifact feeds: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };
    let feeds = match state.db.list_feeds_for_artifact(&artifact_id, page_size, offset) {
        Ok(f) => f,
        Err(e) => {
            log::error!("Failed to list artifact feeds: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    HttpResponse::Ok().json(serde_json::json!({
        "results": feeds,
        "count": total,
        "page": page,
        "page_size": page_size,
        "total_pages": (total + page_size - 1) / page_size,
    }))
}
