use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures_util::StreamExt as _;
use serde::Deserialize;

use crate::db::NewFeedImage;
use crate::domain::{lifecycle, ordering};
use crate::middleware::token_auth;
use crate::models::{Feed, FeedDetail, FeedStatus, User, UserSummary};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateFeedRequest {
    pub artifact_name: String,
    pub status: Option<FeedStatus>,
}

#[derive(Deserialize)]
pub struct UpdateFeedRequest {
    pub artifact_name: Option<String>,
    pub status: Option<FeedStatus>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/feeds")
            .route("", web::get().to(list_feeds))
            .route("", web::post().to(create_feed))
            .route("/mine", web::get().to(my_feeds))
            .route("/{feed_id}", web::get().to(get_feed))
            .route("/{feed_id}", web::patch().to(update_feed))
            .route("/{feed_id}", web::delete().to(delete_feed))
            .route("/{feed_id}/images", web::post().to(upload_feed_images)),
    );
}

fn feed_detail(state: &AppState, feed: Feed) -> Result<FeedDetail, rusqlite::Error> {
    let images = state.db.list_feed_images(&feed.id)?;
    let user = state.db.get_user(&feed.user_id)?;
    let summary = user
        .as_ref()
        .map(UserSummary::from)
        .unwrap_or(UserSummary {
            id: feed.user_id.clone(),
            username: String::new(),
            profile_image: None,
            rank: 1,
        });
    Ok(FeedDetail {
        feed,
        user: summary,
        images,
    })
}

fn can_view(feed: &Feed, caller: &User) -> bool {
    feed.status == FeedStatus::Published || caller.id == feed.user_id || caller.is_staff
}

/// Newest-first feed listing; staff see every status.
async fn list_feeds(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match state.db.list_feeds(!caller.is_staff) {
        Ok(feeds) => HttpResponse::Ok().json(feeds),
        Err(e) => {
            log::error!("Failed to list feeds: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// Create a feed owned by the caller. A feed created directly in the
/// published state goes through the publish lifecycle immediately.
async fn create_feed(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateFeedRequest>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let artifact_name = body.artifact_name.trim();
    if artifact_name.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "artifact_name must not be empty"
        }));
    }
    let status = body.status.unwrap_or_default();

    let feed = match state.db.create_feed(&caller.id, artifact_name, status) {
        Ok(f) => f,
        Err(e) => {
            log::error!("Failed to create feed: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    if feed.status == FeedStatus::Published {
        if let Err(e) = lifecycle::on_publish(&state.db, &feed) {
            return super::domain_error_response(e);
        }
    }

    HttpResponse::Created().json(feed)
}

async fn my_feeds(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match state.db.list_feeds_by_user(&caller.id) {
        Ok(feeds) => HttpResponse::Ok().json(feeds),
        Err(e) => {
            log::error!("Failed to list own feeds: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// Feed detail with author and images. A view by anyone other than the
/// owner bumps the view counter.
async fn get_feed(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let feed_id = path.into_inner();

    let feed = match state.db.get_feed(&feed_id) {
        Ok(Some(f)) => f,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Feed not found"
            }));
        }
        Err(e) => {
            log::error!("Failed to load feed {}: {}", feed_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    if !can_view(&feed, &caller) {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Not allowed to view this feed"
        }));
    }

    let feed = if caller.id != feed.user_id {
        if let Err(e) = state.db.bump_view_count(&feed.id) {
            log::warn!("Failed to bump view count for {}: {}", feed.id, e);
        }
        state.db.get_feed(&feed.id).ok().flatten().unwrap_or(feed)
    } else {
        feed
    };

    match feed_detail(&state, feed) {
        Ok(detail) => HttpResponse::Ok().json(detail),
        Err(e) => {
            log::error!("Failed to expand feed detail: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// Partial update. Status changes follow the one-directional lifecycle; a
/// draft being published here triggers the publish lifecycle exactly once.
async fn update_feed(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateFeedRequest>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let feed_id = path.into_inner();

    let feed = match state.db.get_feed(&feed_id) {
        Ok(Some(f)) => f,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Feed not found"
            }));
        }
        Err(e) => {
            log::error!("Failed to load feed {}: {}", feed_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    if caller.id != feed.user_id && !caller.is_staff {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Not allowed to edit this feed"
        }));
    }

    if let Some(name) = body.artifact_name.as_deref() {
        if name.trim().is_empty() {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "artifact_name must not be empty"
            }));
        }
    }
    if let Some(next) = body.status {
        if !feed.status.can_transition_to(next) {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!(
                    "cannot change feed status from {} to {}",
                    feed.status.as_str(),
                    next.as_str()
                )
            }));
        }
    }

    let becomes_published =
        body.status == Some(FeedStatus::Published) && feed.status != FeedStatus::Published;

    let updated = match state.db.update_feed(
        &feed_id,
        body.artifact_name.as_deref().map(str::trim),
        body.status,
    ) {
        Ok(Some(f)) => f,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Feed not found"
            }));
        }
        Err(e) => {
            log::error!("Failed to update feed {}: {}", feed_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    if becomes_published {
        if let Err(e) = lifecycle::on_publish(&state.db, &updated) {
            return super::domain_error_response(e);
        }
    }

    HttpResponse::Ok().json(updated)
}

/// Soft delete: the feed moves to the deleted status. The owner's counters
/// are left as-is; the recount pass is the repair path for drift.
async fn delete_feed(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let feed_id = path.into_inner();

    let feed = match state.db.get_feed(&feed_id) {
        Ok(Some(f)) => f,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Feed not found"
            }));
        }
        Err(e) => {
            log::error!("Failed to load feed {}: {}", feed_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    if caller.id != feed.user_id && !caller.is_staff {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Not allowed to delete this feed"
        }));
    }

    match state
        .db
        .update_feed(&feed_id, None, Some(FeedStatus::Deleted))
    {
        Ok(_) => HttpResponse::NoContent().finish(),
        Err(e) => {
            log::error!("Failed to delete feed {}: {}", feed_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// Multipart image upload. Orders are assigned after the feed's current
/// maximum, files land under MEDIA_ROOT, and the artifact aggregate is
/// reconciled once the batch is attached.
async fn upload_feed_images(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    mut payload: Multipart,
) -> impl Responder {
    let caller = match token_auth::authed_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let feed_id = path.into_inner();

    let feed = match state.db.get_feed(&feed_id) {
        Ok(Some(f)) => f,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Feed not found"
            }));
        }
        Err(e) => {
            log::error!("Failed to load feed {}: {}", feed_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    // Only the feed owner may attach images
    if caller.id != feed.user_id {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Not allowed to upload to this feed"
        }));
    }

    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(f) => f,
            Err(e) => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": format!("Malformed multipart payload: {e}")
                }));
            }
        };
        if field.name() != "images" {
            continue;
        }
        let filename = field
            .content_disposition()
            .get_filename()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload".to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            match chunk {
                Ok(bytes) => data.extend_from_slice(&bytes),
                Err(e) => {
                    return HttpResponse::BadRequest().json(serde_json::json!({
                        "error": format!("Failed to read upload: {e}")
                    }));
                }
            }
        }
        files.push((filename, data));
    }

    if files.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "image files are required"
        }));
    }

    let max_order = match state.db.max_image_order(&feed_id) {
        Ok(m) => m,
        Err(e) => {
            log::error!("Failed to read image orders for {}: {}", feed_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };
    let orders = match ordering::next_orders(max_order, files.len()) {
        Ok(o) => o,
        Err(e) => return super::domain_error_response(e),
    };

    let mut batch = Vec::with_capacity(files.len());
    for (order, (filename, bytes)) in orders.iter().zip(&files) {
        let relative = ordering::image_relative_path(&feed_id, *order, filename);
        let url = match state.media.save(&relative, bytes) {
            Ok(u) => u,
            Err(e) => {
                log::error!("Failed to store {}: {}", relative, e);
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Failed to store image"
                }));
            }
        };
        batch.push(NewFeedImage {
            order: *order,
            image_url: url,
            metadata: None,
        });
    }

    let created = match state.db.insert_feed_images(&feed_id, &batch) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to attach images to {}: {}", feed_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    // New images may push the name over the auto-create threshold
    if let Err(e) = crate::domain::aggregator::reconcile(&state.db, &feed.artifact_name) {
        return super::domain_error_response(e);
    }

    HttpResponse::Created().json(created)
}
