//! Auth token operations

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use super::super::Database;
use crate::models::{AuthToken, User};

impl Database {
    /// Get the user's API token, creating one on first login.
    pub fn get_or_create_token(&self, user_id: &str) -> SqliteResult<AuthToken> {
        let conn = self.conn.lock().unwrap();

        let existing = conn
            .query_row(
                "SELECT id, user_id, token, created_at FROM auth_tokens WHERE user_id = ?1",
                [user_id],
                |row| Self::row_to_token(row),
            )
            .ok();
        if let Some(token) = existing {
            return Ok(token);
        }

        let id = Uuid::new_v4().to_string();
        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute(
            "INSERT INTO auth_tokens (id, user_id, token, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![&id, user_id, &token, &now_str],
        )?;

        Ok(AuthToken {
            id,
            user_id: user_id.to_string(),
            token,
            created_at: now,
        })
    }

    /// Resolve a bearer token to its active owner.
    pub fn get_user_by_token(&self, token: &str) -> SqliteResult<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.email, u.username, u.gender, u.phone_number, u.provider,
                    u.profile_image, u.is_staff, u.is_active, u.rank, u.feed_count,
                    u.created_at, u.last_login
             FROM users u
             INNER JOIN auth_tokens t ON t.user_id = u.id
             WHERE t.token = ?1 AND u.is_active = 1",
        )?;
        let user = stmt.query_row([token], |row| Self::row_to_user(row)).ok();
        Ok(user)
    }

    fn row_to_token(row: &rusqlite::Row) -> rusqlite::Result<AuthToken> {
        let created_at_str: String = row.get(3)?;
        Ok(AuthToken {
            id: row.get(0)?,
            user_id: row.get(1)?,
            token: row.get(2)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_stable_per_user() {
        let db = Database::new(":memory:").unwrap();
        let user = db
            .create_user("a@example.com", "a", "h", None, None, "local")
            .unwrap();

        let first = db.get_or_create_token(&user.id).unwrap();
        let second = db.get_or_create_token(&user.id).unwrap();
        assert_eq!(first.token, second.token);

        let resolved = db.get_user_by_token(&first.token).unwrap().unwrap();
        assert_eq!(resolved.id, user.id);
        assert_eq!(db.get_user_by_token("bogus").unwrap().map(|u| u.id), None);
    }
}
