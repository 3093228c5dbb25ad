//! SQLite database - schema definitions and connection management
//!
//! This file contains:
//! - Database struct definition
//! - Connection management (new, init)
//! - Schema creation
//!
//! All table operations live in the tables/ subdirectory.

use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::Mutex;

/// Main database wrapper. Access is serialized through the Mutex; the
/// schema-level uniqueness constraints below are what the aggregation core
/// relies on, so they hold even if this is swapped for a pooled backend.
pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

impl Database {
    /// Create a new database connection and initialize schema
    pub fn new(database_url: &str) -> SqliteResult<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let conn = Connection::open(database_url)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    /// Initialize all database tables
    fn init(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                gender TEXT,
                phone_number TEXT,
                provider TEXT NOT NULL DEFAULT 'local',
                profile_image TEXT,
                is_staff INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                rank INTEGER NOT NULL DEFAULT 1,
                feed_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_login TEXT
            )",
            [],
        )?;

        // One opaque API token per user
        conn.execute(
            "CREATE TABLE IF NOT EXISTS auth_tokens (
                id TEXT PRIMARY KEY,
                user_id TEXT UNIQUE NOT NULL,
                token TEXT UNIQUE NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS feeds (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                artifact_name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'published',
                view_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
            [],
        )?;

        // UNIQUE(feed_id, ord) backs the append-only ordering invariant
        conn.execute(
            "CREATE TABLE IF NOT EXISTS feed_images (
                id TEXT PRIMARY KEY,
                feed_id TEXT NOT NULL,
                image_url TEXT NOT NULL,
                ord INTEGER NOT NULL DEFAULT 0,
                metadata TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (feed_id) REFERENCES feeds(id) ON DELETE CASCADE,
                UNIQUE(feed_id, ord)
            )",
            [],
        )?;

        // UNIQUE(name) guards the concurrent create-or-update decision in
        // the aggregator; the losing writer retries as an update.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                description TEXT,
                time_period TEXT,
                estimated_year TEXT,
                origin_location TEXT,
                status TEXT NOT NULL DEFAULT 'auto_generated',
                image_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS artifact_feeds (
                id TEXT PRIMARY KEY,
                artifact_id TEXT NOT NULL,
                feed_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (artifact_id) REFERENCES artifacts(id) ON DELETE CASCADE,
                FOREIGN KEY (feed_id) REFERENCES feeds(id) ON DELETE CASCADE,
                UNIQUE(artifact_id, feed_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS models3d (
                id TEXT PRIMARY KEY,
                artifact_id TEXT NOT NULL,
                model_url TEXT NOT NULL DEFAULT '',
                thumbnail_url TEXT,
                file_format TEXT NOT NULL DEFAULT 'glb',
                poly_count INTEGER,
                file_size INTEGER,
                status TEXT NOT NULL DEFAULT 'pending',
                description TEXT,
                processing_time INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (artifact_id) REFERENCES artifacts(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS model_source_images (
                id TEXT PRIMARY KEY,
                model_id TEXT NOT NULL,
                image_url TEXT NOT NULL,
                ord INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (model_id) REFERENCES models3d(id) ON DELETE CASCADE,
                UNIQUE(model_id, ord)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_feeds_artifact ON feeds(artifact_name, status)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_feeds_user ON feeds(user_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_feed_images_feed ON feed_images(feed_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_models3d_artifact ON models3d(artifact_id, status)",
            [],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_init_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relic.db");
        let db = Database::new(path.to_str().unwrap()).unwrap();

        // Re-opening the same file must be idempotent
        drop(db);
        let _db = Database::new(path.to_str().unwrap()).unwrap();
    }

    #[test]
    fn test_artifact_name_unique() {
        let db = Database::new(":memory:").unwrap();
        let conn = db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO artifacts (id, name, created_at, updated_at)
             VALUES ('a1', 'celadon vase', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        let err = conn
            .execute(
                "INSERT INTO artifacts (id, name, created_at, updated_at)
                 VALUES ('a2', 'celadon vase', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                [],
            )
            .unwrap_err();
        assert!(crate::domain::error::is_unique_violation(&err));
    }

    #[test]
    fn test_artifact_feed_pair_unique() {
        let db = Database::new(":memory:").unwrap();
        let conn = db.conn.lock().unwrap();
        conn.execute_batch(
            "INSERT INTO artifacts (id, name, created_at, updated_at)
             VALUES ('a1', 'n', 't', 't');
             INSERT INTO users (id, email, username, password_hash, created_at)
             VALUES ('u1', 'e', 'u', 'h', 't');
             INSERT INTO feeds (id, user_id, artifact_name, created_at, updated_at)
             VALUES ('f1', 'u1', 'n', 't', 't');
             INSERT INTO artifact_feeds (id, artifact_id, feed_id, created_at)
             VALUES ('l1', 'a1', 'f1', 't');",
        )
        .unwrap();
        let err = conn
            .execute(
                "INSERT INTO artifact_feeds (id, artifact_id, feed_id, created_at)
                 VALUES ('l2', 'a1', 'f1', 't')",
                [],
            )
            .unwrap_err();
        assert!(crate::domain::error::is_unique_violation(&err));
    }
}
