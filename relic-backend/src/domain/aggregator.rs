//! Artifact aggregation: turns the stream of published feeds sharing one
//! artifact name into a single canonical Artifact record.
//!
//! `reconcile` is safe to re-run at any time: it recomputes the image
//! total from scratch, and both write paths are idempotent with respect to
//! already-linked feeds.

use crate::db::Database;
use crate::models::{Artifact, FeedStatus};

use super::error::is_unique_violation;
use super::{DomainError, DomainResult};

/// Published images required under one name before an artifact record is
/// auto-created. Tunable without touching the algorithm.
pub const AUTO_CREATE_IMAGE_THRESHOLD: i64 = 10;

/// Only feeds in this status contribute to aggregation.
pub const COUNTED_FEED_STATUS: FeedStatus = FeedStatus::Published;

/// Create-or-update the canonical artifact for `artifact_name`.
///
/// Returns the artifact when one exists after the call, `None` while the
/// name is still below the auto-create threshold. The create path is
/// guarded by the UNIQUE(name) constraint; losing that race downgrades the
/// call to the update branch, once.
pub fn reconcile(db: &Database, artifact_name: &str) -> DomainResult<Option<Artifact>> {
    let name = artifact_name.trim();
    if name.is_empty() {
        return Err(DomainError::InvalidArgument(
            "artifact_name must not be empty".to_string(),
        ));
    }

    let feeds = db.list_feeds_by_artifact_name(name, COUNTED_FEED_STATUS)?;
    let feed_ids: Vec<String> = feeds.into_iter().map(|f| f.id).collect();
    let total_images = db.count_images_for_feeds(&feed_ids)?;

    if let Some(existing) = db.get_artifact_by_name(name)? {
        return update_existing(db, &existing.id, total_images, &feed_ids);
    }

    if total_images < AUTO_CREATE_IMAGE_THRESHOLD {
        return Ok(None);
    }

    match db.create_artifact_with_links(name, total_images, &feed_ids) {
        Ok(artifact) => {
            log::info!(
                "Auto-created artifact '{}' from {} feeds ({} images)",
                name,
                feed_ids.len(),
                total_images
            );
            Ok(Some(artifact))
        }
        Err(err) if is_unique_violation(&err) => {
            // Lost the create race; the winner's row exists now.
            log::warn!("Concurrent create for artifact '{name}', retrying as update");
            let existing = db.get_artifact_by_name(name)?.ok_or_else(|| {
                DomainError::Conflict(format!(
                    "artifact '{name}' vanished after duplicate-create conflict"
                ))
            })?;
            update_existing(db, &existing.id, total_images, &feed_ids)
        }
        Err(err) => Err(err.into()),
    }
}

fn update_existing(
    db: &Database,
    artifact_id: &str,
    total_images: i64,
    feed_ids: &[String],
) -> DomainResult<Option<Artifact>> {
    let refreshed = db
        .refresh_artifact_aggregate(artifact_id, total_images, feed_ids)?
        .ok_or_else(|| DomainError::NotFound(format!("artifact {artifact_id}")))?;
    Ok(Some(refreshed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewFeedImage;
    use crate::models::ArtifactStatus;

    fn test_db() -> (Database, String) {
        let db = Database::new(":memory:").unwrap();
        let user = db
            .create_user("a@example.com", "a", "h", None, None, "local")
            .unwrap();
        (db, user.id)
    }

    fn feed_with_images(db: &Database, user_id: &str, name: &str, count: usize) -> String {
        let feed = db.create_feed(user_id, name, FeedStatus::Published).unwrap();
        if count > 0 {
            let batch: Vec<NewFeedImage> = (0..count as i64)
                .map(|o| NewFeedImage {
                    order: o,
                    image_url: format!("/media/feeds/{}/image_{o}_x.jpg", feed.id),
                    metadata: None,
                })
                .collect();
            db.insert_feed_images(&feed.id, &batch).unwrap();
        }
        feed.id
    }

    #[test]
    fn test_below_threshold_is_noop() {
        let (db, user_id) = test_db();
        feed_with_images(&db, &user_id, "celadon vase", 9);

        assert!(reconcile(&db, "celadon vase").unwrap().is_none());
        assert!(db.get_artifact_by_name("celadon vase").unwrap().is_none());
    }

    #[test]
    fn test_threshold_crossing_creates_artifact() {
        let (db, user_id) = test_db();
        let f1 = feed_with_images(&db, &user_id, "celadon vase", 9);
        assert!(reconcile(&db, "celadon vase").unwrap().is_none());

        // The 10th image arrives on a second feed
        let f2 = feed_with_images(&db, &user_id, "celadon vase", 1);
        let artifact = reconcile(&db, "celadon vase").unwrap().unwrap();

        assert_eq!(artifact.status, ArtifactStatus::AutoGenerated);
        assert_eq!(artifact.image_count, 10);
        assert_eq!(db.count_artifact_links(&artifact.id).unwrap(), 2);

        let linked = db.list_feeds_for_artifact(&artifact.id, 10, 0).unwrap();
        let mut linked_ids: Vec<String> = linked.into_iter().map(|f| f.id).collect();
        linked_ids.sort();
        let mut expected = vec![f1, f2];
        expected.sort();
        assert_eq!(linked_ids, expected);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let (db, user_id) = test_db();
        feed_with_images(&db, &user_id, "celadon vase", 12);

        let first = reconcile(&db, "celadon vase").unwrap().unwrap();
        let second = reconcile(&db, "celadon vase").unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.image_count, second.image_count);
        assert_eq!(db.count_artifact_links(&first.id).unwrap(), 1);
    }

    #[test]
    fn test_no_duplicate_links_across_many_reconciles() {
        let (db, user_id) = test_db();
        for _ in 0..3 {
            feed_with_images(&db, &user_id, "celadon vase", 4);
        }
        for _ in 0..5 {
            reconcile(&db, "celadon vase").unwrap();
        }
        let artifact = db.get_artifact_by_name("celadon vase").unwrap().unwrap();
        assert_eq!(db.count_artifact_links(&artifact.id).unwrap(), 3);
        assert_eq!(artifact.image_count, 12);
    }

    #[test]
    fn test_update_picks_up_new_feeds_and_counts() {
        let (db, user_id) = test_db();
        feed_with_images(&db, &user_id, "celadon vase", 10);
        let artifact = reconcile(&db, "celadon vase").unwrap().unwrap();
        assert_eq!(artifact.image_count, 10);

        feed_with_images(&db, &user_id, "celadon vase", 5);
        let updated = reconcile(&db, "celadon vase").unwrap().unwrap();
        assert_eq!(updated.id, artifact.id);
        assert_eq!(updated.image_count, 15);
        assert_eq!(db.count_artifact_links(&artifact.id).unwrap(), 2);
    }

    #[test]
    fn test_existing_artifact_updates_even_below_threshold() {
        // Once created, an artifact is only ever updated; the threshold
        // applies to creation alone.
        let (db, user_id) = test_db();
        let feed_id = feed_with_images(&db, &user_id, "celadon vase", 10);
        reconcile(&db, "celadon vase").unwrap().unwrap();

        db.update_feed(&feed_id, None, Some(FeedStatus::Hidden)).unwrap();
        let updated = reconcile(&db, "celadon vase").unwrap().unwrap();
        assert_eq!(updated.image_count, 0);
    }

    #[test]
    fn test_unpublished_feeds_do_not_count() {
        let (db, user_id) = test_db();
        feed_with_images(&db, &user_id, "celadon vase", 6);

        let draft = db
            .create_feed(&user_id, "celadon vase", FeedStatus::Draft)
            .unwrap();
        let batch: Vec<NewFeedImage> = (0..6)
            .map(|o| NewFeedImage {
                order: o,
                image_url: format!("/d{o}.jpg"),
                metadata: None,
            })
            .collect();
        db.insert_feed_images(&draft.id, &batch).unwrap();

        // 6 published + 6 draft images: threshold not reached
        assert!(reconcile(&db, "celadon vase").unwrap().is_none());
    }

    #[test]
    fn test_empty_name_rejected() {
        let (db, _) = test_db();
        assert!(matches!(
            reconcile(&db, "   "),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_pre_existing_artifact_routes_to_update() {
        let (db, user_id) = test_db();
        feed_with_images(&db, &user_id, "celadon vase", 10);

        // Another writer already materialized the row, without links.
        let rival = db.create_artifact_with_links("celadon vase", 10, &[]).unwrap();

        let artifact = reconcile(&db, "celadon vase").unwrap().unwrap();
        assert_eq!(artifact.id, rival.id);
        assert_eq!(db.count_artifact_links(&rival.id).unwrap(), 1);
    }
}
