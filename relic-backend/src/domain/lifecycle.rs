//! Feed lifecycle orchestration.
//!
//! `on_publish` is the single place where a feed entering the published
//! state ripples outward: the owner's counters move, then the artifact
//! aggregate is reconciled. It is called explicitly by the publish use
//! cases, never from a persistence hook, so every side effect stays
//! auditable.

use crate::db::Database;
use crate::models::{Artifact, Feed};

use super::{aggregator, rank, DomainError, DomainResult};

/// Handle a feed's transition into the published state. Must run exactly
/// once per transition: on publish-at-creation, or on a draft being
/// published later. Never runs on edits to an already-published feed.
///
/// Effects, in order: bump the owner's feed_count, re-derive their rank,
/// persist both, then reconcile the artifact aggregate for the feed's name.
pub fn on_publish(db: &Database, feed: &Feed) -> DomainResult<Option<Artifact>> {
    let feed_count = db
        .bump_feed_count(&feed.user_id)?
        .ok_or_else(|| DomainError::NotFound(format!("user {}", feed.user_id)))?;
    let new_rank = rank::rank_for(feed_count)?;
    db.set_user_rank(&feed.user_id, new_rank)?;

    log::debug!(
        "Publish by user {}: feed_count={feed_count}, rank={new_rank}",
        feed.user_id
    );

    aggregator::reconcile(db, &feed.artifact_name)
}

/// Recompute a user's published feed count from ground truth and re-derive
/// the rank from it. The cached counter must always agree with this; any
/// divergence (e.g. after feed deletions, which deliberately do not
/// decrement) is repaired here rather than papered over.
pub fn recount(db: &Database, user_id: &str) -> DomainResult<(i64, i32)> {
    if db.get_user(user_id)?.is_none() {
        return Err(DomainError::NotFound(format!("user {user_id}")));
    }

    let feed_count = db.count_published_feeds(user_id)?;
    let new_rank = rank::rank_for(feed_count)?;
    db.set_feed_count_and_rank(user_id, feed_count, new_rank)?;
    Ok((feed_count, new_rank))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewFeedImage;
    use crate::models::FeedStatus;

    fn test_db() -> (Database, String) {
        let db = Database::new(":memory:").unwrap();
        let user = db
            .create_user("a@example.com", "a", "h", None, None, "local")
            .unwrap();
        (db, user.id)
    }

    fn publish_feed(db: &Database, user_id: &str, name: &str) -> Feed {
        let feed = db.create_feed(user_id, name, FeedStatus::Published).unwrap();
        on_publish(db, &feed).unwrap();
        feed
    }

    #[test]
    fn test_sequential_publishes_track_count_and_rank() {
        let (db, user_id) = test_db();

        for m in 1..=12 {
            publish_feed(&db, &user_id, &format!("artifact {m}"));
            let user = db.get_user(&user_id).unwrap().unwrap();
            assert_eq!(user.feed_count, m);
            assert_eq!(user.rank, rank::rank_for(m).unwrap());
        }

        // 12 published feeds puts the user in tier 2
        let user = db.get_user(&user_id).unwrap().unwrap();
        assert_eq!(user.rank, 2);
    }

    #[test]
    fn test_publish_triggers_aggregation() {
        let (db, user_id) = test_db();
        let feed = db
            .create_feed(&user_id, "stone lantern", FeedStatus::Published)
            .unwrap();
        let batch: Vec<NewFeedImage> = (0..10)
            .map(|o| NewFeedImage {
                order: o,
                image_url: format!("/i{o}.jpg"),
                metadata: None,
            })
            .collect();
        db.insert_feed_images(&feed.id, &batch).unwrap();

        let artifact = on_publish(&db, &feed).unwrap().unwrap();
        assert_eq!(artifact.name, "stone lantern");
        assert_eq!(artifact.image_count, 10);
    }

    #[test]
    fn test_unknown_owner_is_not_found() {
        let (db, _) = test_db();
        let feed = Feed {
            id: "f".to_string(),
            user_id: "ghost".to_string(),
            artifact_name: "x".to_string(),
            status: FeedStatus::Published,
            view_count: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(matches!(
            on_publish(&db, &feed),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn test_incremental_counter_agrees_with_recount() {
        let (db, user_id) = test_db();
        for m in 0..11 {
            publish_feed(&db, &user_id, &format!("artifact {m}"));
        }
        let incremental = db.get_user(&user_id).unwrap().unwrap();

        let (recounted, recount_rank) = recount(&db, &user_id).unwrap();
        assert_eq!(recounted, incremental.feed_count);
        assert_eq!(recount_rank, incremental.rank);
    }

    #[test]
    fn test_recount_repairs_drift() {
        let (db, user_id) = test_db();
        for m in 0..3 {
            publish_feed(&db, &user_id, &format!("artifact {m}"));
        }
        // Counters drift when a published feed is deleted (no decrement by
        // design); recount is the repair path.
        let victim = db.list_feeds_by_user(&user_id).unwrap().remove(0);
        db.update_feed(&victim.id, None, Some(FeedStatus::Deleted))
            .unwrap();

        let stale = db.get_user(&user_id).unwrap().unwrap();
        assert_eq!(stale.feed_count, 3);

        let (feed_count, new_rank) = recount(&db, &user_id).unwrap();
        assert_eq!(feed_count, 2);
        assert_eq!(new_rank, 1);
        let repaired = db.get_user(&user_id).unwrap().unwrap();
        assert_eq!(repaired.feed_count, 2);
    }

    #[test]
    fn test_recount_unknown_user() {
        let (db, _) = test_db();
        assert!(matches!(
            recount(&db, "ghost"),
            Err(DomainError::NotFound(_))
        ));
    }
}
