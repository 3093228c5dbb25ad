//! Feed and feed image table operations

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use super::super::Database;
use crate::models::{Feed, FeedImage, FeedStatus};

const FEED_COLUMNS: &str =
    "id, user_id, artifact_name, status, view_count, created_at, updated_at";

/// One image to attach to a feed, with its order already assigned by the
/// ordering policy.
#[derive(Debug)]
pub struct NewFeedImage {
    pub order: i64,
    pub image_url: String,
    pub metadata: Option<serde_json::Value>,
}

impl Database {
    pub fn create_feed(
        &self,
        user_id: &str,
        artifact_name: &str,
        status: FeedStatus,
    ) -> SqliteResult<Feed> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute(
            "INSERT INTO feeds (id, user_id, artifact_name, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![&id, user_id, artifact_name, status.as_str(), &now_str],
        )?;

        Ok(Feed {
            id,
            user_id: user_id.to_string(),
            artifact_name: artifact_name.to_string(),
            status,
            view_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_feed(&self, feed_id: &str) -> SqliteResult<Option<Feed>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?1"))?;
        let feed = stmt.query_row([feed_id], |row| Self::row_to_feed(row)).ok();
        Ok(feed)
    }

    /// Newest-first feed listing; non-staff callers only see published rows.
    pub fn list_feeds(&self, only_published: bool) -> SqliteResult<Vec<Feed>> {
        let conn = self.conn.lock().unwrap();
        let query = if only_published {
            format!(
                "SELECT {FEED_COLUMNS} FROM feeds WHERE status = 'published'
                 ORDER BY created_at DESC"
            )
        } else {
            format!("SELECT {FEED_COLUMNS} FROM feeds ORDER BY created_at DESC")
        };
        let mut stmt = conn.prepare(&query)?;
        let feeds = stmt
            .query_map([], |row| Self::row_to_feed(row))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(feeds)
    }

    pub fn list_feeds_by_user(&self, user_id: &str) -> SqliteResult<Vec<Feed>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;
        let feeds = stmt
            .query_map([user_id], |row| Self::row_to_feed(row))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(feeds)
    }

    /// Feeds sharing one aggregation key, filtered to a single status.
    pub fn list_feeds_by_artifact_name(
        &self,
        artifact_name: &str,
        status: FeedStatus,
    ) -> SqliteResult<Vec<Feed>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds
             WHERE artifact_name = ?1 AND status = ?2
             ORDER BY created_at ASC"
        ))?;
        let feeds = stmt
            .query_map(
                rusqlite::params![artifact_name, status.as_str()],
                |row| Self::row_to_feed(row),
            )?
            .filter_map(|r| r.ok())
            .collect();
        Ok(feeds)
    }

    /// Partial update of a feed's label and status. Status transition
    /// rules are enforced by the caller before this runs.
    pub fn update_feed(
        &self,
        feed_id: &str,
        artifact_name: Option<&str>,
        status: Option<FeedStatus>,
    ) -> SqliteResult<Option<Feed>> {
        {
            let conn = self.conn.lock().unwrap();
            let now = Utc::now().to_rfc3339();
            let changed = conn.execute(
                "UPDATE feeds SET
                    artifact_name = COALESCE(?1, artifact_name),
                    status = COALESCE(?2, status),
                    updated_at = ?3
                 WHERE id = ?4",
                rusqlite::params![
                    artifact_name,
                    status.map(|s| s.as_str()),
                    &now,
                    feed_id
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
        }
        self.get_feed(feed_id)
    }

    pub fn bump_view_count(&self, feed_id: &str) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE feeds SET view_count = view_count + 1 WHERE id = ?1",
            [feed_id],
        )?;
        Ok(())
    }

    /// Ground-truth published feed count for one user, independent of the
    /// cached counter on the users row.
    pub fn count_published_feeds(&self, user_id: &str) -> SqliteResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM feeds WHERE user_id = ?1 AND status = 'published'",
            [user_id],
            |row| row.get(0),
        )
    }

    /// Highest order currently assigned on a feed, None when it has no
    /// images.
    pub fn max_image_order(&self, feed_id: &str) -> SqliteResult<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT MAX(ord) FROM feed_images WHERE feed_id = ?1",
            [feed_id],
            |row| row.get(0),
        )
    }

    /// Attach a batch of images in one transaction; either the whole batch
    /// lands or none of it does.
    pub fn insert_feed_images(
        &self,
        feed_id: &str,
        images: &[NewFeedImage],
    ) -> SqliteResult<Vec<FeedImage>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let mut created = Vec::with_capacity(images.len());
        for image in images {
            let id = Uuid::new_v4().to_string();
            let metadata_str = image
                .metadata
                .as_ref()
                .map(|m| m.to_string());
            tx.execute(
                "INSERT INTO feed_images (id, feed_id, image_url, ord, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    &id,
                    feed_id,
                    &image.image_url,
                    image.order,
                    metadata_str,
                    &now_str
                ],
            )?;
            created.push(FeedImage {
                id,
                feed_id: feed_id.to_string(),
                image_url: image.image_url.clone(),
                order: image.order,
                metadata: image.metadata.clone(),
                created_at: now,
            });
        }

        tx.commit()?;
        Ok(created)
    }

    pub fn list_feed_images(&self, feed_id: &str) -> SqliteResult<Vec<FeedImage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, feed_id, image_url, ord, metadata, created_at
             FROM feed_images WHERE feed_id = ?1 ORDER BY ord ASC",
        )?;
        let images = stmt
            .query_map([feed_id], |row| Self::row_to_feed_image(row))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(images)
    }

    /// Total image count across a set of feeds. Each image belongs to
    /// exactly one feed, so a plain sum is correct.
    pub fn count_images_for_feeds(&self, feed_ids: &[String]) -> SqliteResult<i64> {
        if feed_ids.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.lock().unwrap();
        let placeholders: Vec<String> = feed_ids
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", i + 1))
            .collect();
        let query = format!(
            "SELECT COUNT(*) FROM feed_images WHERE feed_id IN ({})",
            placeholders.join(", ")
        );
        conn.query_row(
            &query,
            rusqlite::params_from_iter(feed_ids.iter()),
            |row| row.get(0),
        )
    }

    pub(crate) fn row_to_feed(row: &rusqlite::Row) -> rusqlite::Result<Feed> {
        let status_str: String = row.get(3)?;
        let created_at_str: String = row.get(5)?;
        let updated_at_str: String = row.get(6)?;

        Ok(Feed {
            id: row.get(0)?,
            user_id: row.get(1)?,
            artifact_name: row.get(2)?,
            status: FeedStatus::from_str(&status_str).unwrap_or_default(),
            view_count: row.get(4)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    fn row_to_feed_image(row: &rusqlite::Row) -> rusqlite::Result<FeedImage> {
        let metadata_str: Option<String> = row.get(4)?;
        let created_at_str: String = row.get(5)?;

        Ok(FeedImage {
            id: row.get(0)?,
            feed_id: row.get(1)?,
            image_url: row.get(2)?,
            order: row.get(3)?,
            metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
