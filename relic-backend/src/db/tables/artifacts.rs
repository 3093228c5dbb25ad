//! Artifact and artifact-feed link table operations
//!
//! The two write paths the aggregator uses (`create_artifact_with_links`,
//! `refresh_artifact_aggregate`) each run in a single transaction: an
//! artifact is never visible without its qualifying feed links.

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use super::super::Database;
use crate::models::{Artifact, ArtifactStatus, Feed};

const ARTIFACT_COLUMNS: &str = "id, name, description, time_period, estimated_year, \
     origin_location, status, image_count, created_at, updated_at";

/// Optional descriptive fields accepted by `update_artifact`.
#[derive(Debug, Default)]
pub struct ArtifactUpdate<'a> {
    pub description: Option<&'a str>,
    pub time_period: Option<&'a str>,
    pub estimated_year: Option<&'a str>,
    pub origin_location: Option<&'a str>,
    pub status: Option<ArtifactStatus>,
}

impl Database {
    pub fn get_artifact(&self, artifact_id: &str) -> SqliteResult<Option<Artifact>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = ?1"
        ))?;
        let artifact = stmt
            .query_row([artifact_id], |row| Self::row_to_artifact(row))
            .ok();
        Ok(artifact)
    }

    /// Exact-name lookup; the aggregation key match.
    pub fn get_artifact_by_name(&self, name: &str) -> SqliteResult<Option<Artifact>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE name = ?1"
        ))?;
        let artifact = stmt
            .query_row([name], |row| Self::row_to_artifact(row))
            .ok();
        Ok(artifact)
    }

    /// Newest-first artifact listing. With `status` set, only that status;
    /// otherwise everything, minus rejected rows unless
    /// `include_rejected`.
    pub fn list_artifacts(
        &self,
        status: Option<ArtifactStatus>,
        include_rejected: bool,
    ) -> SqliteResult<Vec<Artifact>> {
        let conn = self.conn.lock().unwrap();
        let (query, param) = match status {
            Some(s) => (
                format!(
                    "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE status = ?1
                     ORDER BY created_at DESC"
                ),
                Some(s.as_str()),
            ),
            None if include_rejected => (
                format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts ORDER BY created_at DESC"),
                None,
            ),
            None => (
                format!(
                    "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE status != 'rejected'
                     ORDER BY created_at DESC"
                ),
                None,
            ),
        };

        let mut stmt = conn.prepare(&query)?;
        let artifacts = match param {
            Some(p) => stmt
                .query_map([p], |row| Self::row_to_artifact(row))?
                .filter_map(|r| r.ok())
                .collect(),
            None => stmt
                .query_map([], |row| Self::row_to_artifact(row))?
                .filter_map(|r| r.ok())
                .collect(),
        };
        Ok(artifacts)
    }

    /// Admin-facing partial update of descriptive fields and review status.
    pub fn update_artifact(
        &self,
        artifact_id: &str,
        update: &ArtifactUpdate,
    ) -> SqliteResult<Option<Artifact>> {
        {
            let conn = self.conn.lock().unwrap();
            let now = Utc::now().to_rfc3339();
            let changed = conn.execute(
                "UPDATE artifacts SET
                    description = COALESCE(?1, description),
                    time_period = COALESCE(?2, time_period),
                    estimated_year = COALESCE(?3, estimated_year),
                    origin_location = COALESCE(?4, origin_location),
                    status = COALESCE(?5, status),
                    updated_at = ?6
                 WHERE id = ?7",
                rusqlite::params![
                    update.description,
                    update.time_period,
                    update.estimated_year,
                    update.origin_location,
                    update.status.map(|s| s.as_str()),
                    &now,
                    artifact_id
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
        }
        self.get_artifact(artifact_id)
    }

    /// Create an auto-generated artifact and link every qualifying feed,
    /// atomically. A UNIQUE(name) violation propagates to the caller,
    /// which falls back to the update branch.
    pub fn create_artifact_with_links(
        &self,
        name: &str,
        image_count: i64,
        feed_ids: &[String],
    ) -> SqliteResult<Artifact> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        tx.execute(
            "INSERT INTO artifacts (id, name, status, image_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![
                &id,
                name,
                ArtifactStatus::AutoGenerated.as_str(),
                image_count,
                &now_str
            ],
        )?;

        for feed_id in feed_ids {
            tx.execute(
                "INSERT OR IGNORE INTO artifact_feeds (id, artifact_id, feed_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![Uuid::new_v4().to_string(), &id, feed_id, &now_str],
            )?;
        }

        tx.commit()?;

        Ok(Artifact {
            id,
            name: name.to_string(),
            description: None,
            time_period: None,
            estimated_year: None,
            origin_location: None,
            status: ArtifactStatus::AutoGenerated,
            image_count,
            created_at: now,
            updated_at: now,
        })
    }

    /// Refresh the cached image count and link any qualifying feed not yet
    /// linked, atomically. INSERT OR IGNORE against the (artifact, feed)
    /// uniqueness makes re-runs no-ops.
    pub fn refresh_artifact_aggregate(
        &self,
        artifact_id: &str,
        image_count: i64,
        feed_ids: &[String],
    ) -> SqliteResult<Option<Artifact>> {
        {
            let mut conn = self.conn.lock().unwrap();
            let tx = conn.transaction()?;
            let now_str = Utc::now().to_rfc3339();

            let changed = tx.execute(
                "UPDATE artifacts SET image_count = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![image_count, &now_str, artifact_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            for feed_id in feed_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO artifact_feeds (id, artifact_id, feed_id, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![Uuid::new_v4().to_string(), artifact_id, feed_id, &now_str],
                )?;
            }

            tx.commit()?;
        }
        self.get_artifact(artifact_id)
    }

    pub fn count_artifact_links(&self, artifact_id: &str) -> SqliteResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM artifact_feeds WHERE artifact_id = ?1",
            [artifact_id],
            |row| row.get(0),
        )
    }

    /// Feeds linked to an artifact, oldest link first, paginated.
    pub fn list_feeds_for_artifact(
        &self,
        artifact_id: &str,
        limit: i64,
        offset: i64,
    ) -> SqliteResult<Vec<Feed>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT f.id, f.user_id, f.artifact_name, f.status, f.view_count,
                    f.created_at, f.updated_at
             FROM feeds f
             INNER JOIN artifact_feeds af ON af.feed_id = f.id
             WHERE af.artifact_id = ?1
             ORDER BY af.created_at ASC
             LIMIT ?2 OFFSET ?3",
        )?;
        let feeds = stmt
            .query_map(
                rusqlite::params![artifact_id, limit, offset],
                |row| Self::row_to_feed(row),
            )?
            .filter_map(|r| r.ok())
            .collect();
        Ok(feeds)
    }

    fn row_to_artifact(row: &rusqlite::Row) -> rusqlite::Result<Artifact> {
        let status_str: String = row.get(6)?;
        let created_at_str: String = row.get(8)?;
        let updated_at_str: String = row.get(9)?;

        Ok(Artifact {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            time_period: row.get(3)?,
            estimated_year: row.get(4)?,
            origin_location: row.get(5)?,
            status: ArtifactStatus::from_str(&status_str).unwrap_or_default(),
            image_count: row.get(7)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedStatus;

    fn seeded_db() -> (Database, Vec<String>) {
        let db = Database::new(":memory:").unwrap();
        let user = db
            .create_user("a@example.com", "a", "h", None, None, "local")
            .unwrap();
        let mut feed_ids = Vec::new();
        for _ in 0..3 {
            let feed = db
                .create_feed(&user.id, "bronze bell", FeedStatus::Published)
                .unwrap();
            feed_ids.push(feed.id);
        }
        (db, feed_ids)
    }

    #[test]
    fn test_create_with_links() {
        let (db, feed_ids) = seeded_db();
        let artifact = db
            .create_artifact_with_links("bronze bell", 12, &feed_ids)
            .unwrap();
        assert_eq!(artifact.status, ArtifactStatus::AutoGenerated);
        assert_eq!(artifact.image_count, 12);
        assert_eq!(db.count_artifact_links(&artifact.id).unwrap(), 3);

        let fetched = db.get_artifact_by_name("bronze bell").unwrap().unwrap();
        assert_eq!(fetched.id, artifact.id);
    }

    #[test]
    fn test_duplicate_name_create_fails() {
        let (db, feed_ids) = seeded_db();
        db.create_artifact_with_links("bronze bell", 12, &feed_ids)
            .unwrap();
        let err = db
            .create_artifact_with_links("bronze bell", 12, &feed_ids)
            .unwrap_err();
        assert!(crate::domain::error::is_unique_violation(&err));
    }

    #[test]
    fn test_refresh_is_idempotent_on_links() {
        let (db, feed_ids) = seeded_db();
        let artifact = db
            .create_artifact_with_links("bronze bell", 10, &feed_ids[..2])
            .unwrap();

        let refreshed = db
            .refresh_artifact_aggregate(&artifact.id, 15, &feed_ids)
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.image_count, 15);
        assert_eq!(db.count_artifact_links(&artifact.id).unwrap(), 3);

        // Second run changes nothing
        db.refresh_artifact_aggregate(&artifact.id, 15, &feed_ids)
            .unwrap();
        assert_eq!(db.count_artifact_links(&artifact.id).unwrap(), 3);

        assert_eq!(
            db.refresh_artifact_aggregate("missing", 1, &feed_ids).unwrap(),
            None
        );
    }

    #[test]
    fn test_listing_hides_rejected_by_default() {
        let (db, feed_ids) = seeded_db();
        let artifact = db
            .create_artifact_with_links("bronze bell", 10, &feed_ids)
            .unwrap();
        db.update_artifact(
            &artifact.id,
            &ArtifactUpdate {
                status: Some(ArtifactStatus::Rejected),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(db.list_artifacts(None, false).unwrap().is_empty());
        assert_eq!(db.list_artifacts(None, true).unwrap().len(), 1);
        assert_eq!(
            db.list_artifacts(Some(ArtifactStatus::Rejected), false)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_feed_pagination() {
        let (db, feed_ids) = seeded_db();
        let artifact = db
            .create_artifact_with_links("bronze bell", 10, &feed_ids)
            .unwrap();
        assert_eq!(db.count_artifact_links(&artifact.id).unwrap(), 3);

        let page1 = db.list_feeds_for_artifact(&artifact.id, 2, 0).unwrap();
        let page2 = db.list_feeds_for_artifact(&artifact.id, 2, 2).unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page2.len(), 1);
    }
}
