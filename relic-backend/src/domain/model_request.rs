//! 3D model request guard.
//!
//! An artifact may have at most one model in flight (pending or
//! processing). A granted request snapshots the published feed images as
//! the reconstruction inputs, ordered by the same policy that ordered them
//! on their feeds.

use crate::db::Database;
use crate::models::{FileFormat, Model3D};

use super::{aggregator, ordering, DomainError, DomainResult};

pub fn request_model(
    db: &Database,
    artifact_id: &str,
    file_format: FileFormat,
    description: Option<&str>,
) -> DomainResult<Model3D> {
    let artifact = db
        .get_artifact(artifact_id)?
        .ok_or_else(|| DomainError::NotFound(format!("artifact {artifact_id}")))?;

    if let Some(active) = db.find_active_model(artifact_id)? {
        return Err(DomainError::Conflict(format!(
            "artifact {} already has a {} model (id {})",
            artifact_id,
            active.status.as_str(),
            active.id
        )));
    }

    let model = db.insert_model_request(artifact_id, file_format, description)?;

    // Snapshot reconstruction inputs from the artifact's published feeds.
    let feeds = db.list_feeds_by_artifact_name(&artifact.name, aggregator::COUNTED_FEED_STATUS)?;
    let mut urls = Vec::new();
    for feed in &feeds {
        for image in db.list_feed_images(&feed.id)? {
            urls.push(image.image_url);
        }
    }
    if !urls.is_empty() {
        let orders = ordering::next_orders(None, urls.len())?;
        let batch: Vec<(i64, String)> = orders.into_iter().zip(urls).collect();
        db.insert_source_images(&model.id, &batch)?;
    }

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ModelStatusUpdate, NewFeedImage};
    use crate::models::{FeedStatus, ModelStatus};

    fn db_with_artifact() -> (Database, String) {
        let db = Database::new(":memory:").unwrap();
        let user = db
            .create_user("a@example.com", "a", "h", None, None, "local")
            .unwrap();
        let feed = db
            .create_feed(&user.id, "bell", FeedStatus::Published)
            .unwrap();
        let batch: Vec<NewFeedImage> = (0..3)
            .map(|o| NewFeedImage {
                order: o,
                image_url: format!("/i{o}.jpg"),
                metadata: None,
            })
            .collect();
        db.insert_feed_images(&feed.id, &batch).unwrap();
        let artifact = db
            .create_artifact_with_links("bell", 3, &[feed.id])
            .unwrap();
        (db, artifact.id)
    }

    #[test]
    fn test_request_snapshots_source_images() {
        let (db, artifact_id) = db_with_artifact();
        let model = request_model(&db, &artifact_id, FileFormat::Glb, None).unwrap();

        let sources = db.list_source_images(&model.id).unwrap();
        assert_eq!(sources.len(), 3);
        assert_eq!(
            sources.iter().map(|s| s.order).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_second_request_conflicts_while_active() {
        let (db, artifact_id) = db_with_artifact();
        let first = request_model(&db, &artifact_id, FileFormat::Glb, None).unwrap();

        assert!(matches!(
            request_model(&db, &artifact_id, FileFormat::Glb, None),
            Err(DomainError::Conflict(_))
        ));

        // Processing still occupies the slot
        db.update_model_status(
            &first.id,
            &ModelStatusUpdate {
                status: ModelStatus::Processing,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(
            request_model(&db, &artifact_id, FileFormat::Glb, None),
            Err(DomainError::Conflict(_))
        ));

        // A finished model frees it
        db.update_model_status(
            &first.id,
            &ModelStatusUpdate {
                status: ModelStatus::Completed,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(request_model(&db, &artifact_id, FileFormat::Glb, None).is_ok());
    }

    #[test]
    fn test_unknown_artifact_not_found() {
        let (db, _) = db_with_artifact();
        assert!(matches!(
            request_model(&db, "ghost", FileFormat::Glb, None),
            Err(DomainError::NotFound(_))
        ));
    }
}
