//! User table operations

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use super::super::Database;
use crate::models::User;

const USER_COLUMNS: &str = "id, email, username, gender, phone_number, provider, \
     profile_image, is_staff, is_active, rank, feed_count, created_at, last_login";

/// Optional profile fields accepted by `update_user`; `None` leaves the
/// stored value untouched.
#[derive(Debug, Default)]
pub struct UserUpdate<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
    pub gender: Option<&'a str>,
    pub phone_number: Option<&'a str>,
    pub profile_image: Option<&'a str>,
}

impl Database {
    pub fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        gender: Option<&str>,
        phone_number: Option<&str>,
        provider: &str,
    ) -> SqliteResult<User> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute(
            "INSERT INTO users (id, email, username, password_hash, gender, phone_number, provider, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![&id, email, username, password_hash, gender, phone_number, provider, &now_str],
        )?;

        Ok(User {
            id,
            email: email.to_string(),
            username: username.to_string(),
            gender: gender.map(|s| s.to_string()),
            phone_number: phone_number.map(|s| s.to_string()),
            provider: provider.to_string(),
            profile_image: None,
            is_staff: false,
            is_active: true,
            rank: 1,
            feed_count: 0,
            created_at: now,
            last_login: None,
        })
    }

    pub fn get_user(&self, user_id: &str) -> SqliteResult<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
        let user = stmt
            .query_row([user_id], |row| Self::row_to_user(row))
            .ok();
        Ok(user)
    }

    /// Look up a user by email together with the stored password hash.
    /// Used only by the login flow.
    pub fn get_user_with_password(&self, email: &str) -> SqliteResult<Option<(User, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"
        ))?;
        let result = stmt
            .query_row([email], |row| {
                let user = Self::row_to_user(row)?;
                let hash: String = row.get(13)?;
                Ok((user, hash))
            })
            .ok();
        Ok(result)
    }

    /// Partial profile update; returns the fresh row, or None if the user
    /// does not exist.
    pub fn update_user(&self, user_id: &str, update: &UserUpdate) -> SqliteResult<Option<User>> {
        {
            let conn = self.conn.lock().unwrap();
            let changed = conn.execute(
                "UPDATE users SET
                    username = COALESCE(?1, username),
                    email = COALESCE(?2, email),
                    gender = COALESCE(?3, gender),
                    phone_number = COALESCE(?4, phone_number),
                    profile_image = COALESCE(?5, profile_image)
                 WHERE id = ?6",
                rusqlite::params![
                    update.username,
                    update.email,
                    update.gender,
                    update.phone_number,
                    update.profile_image,
                    user_id
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
        }
        self.get_user(user_id)
    }

    /// Increment the published-feed counter, returning the new count.
    /// Returns None when the user does not exist.
    pub fn bump_feed_count(&self, user_id: &str) -> SqliteResult<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE users SET feed_count = feed_count + 1 WHERE id = ?1",
            [user_id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let count = conn.query_row(
            "SELECT feed_count FROM users WHERE id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(Some(count))
    }

    pub fn set_user_rank(&self, user_id: &str, rank: i32) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET rank = ?1 WHERE id = ?2",
            rusqlite::params![rank, user_id],
        )?;
        Ok(())
    }

    /// Overwrite both derived counters at once; the repair path after a
    /// full recount.
    pub fn set_feed_count_and_rank(
        &self,
        user_id: &str,
        feed_count: i64,
        rank: i32,
    ) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET feed_count = ?1, rank = ?2 WHERE id = ?3",
            rusqlite::params![feed_count, rank, user_id],
        )?;
        Ok(())
    }

    pub fn touch_last_login(&self, user_id: &str) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            rusqlite::params![&now, user_id],
        )?;
        Ok(())
    }

    pub(crate) fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let created_at_str: String = row.get(11)?;
        let last_login_str: Option<String> = row.get(12)?;

        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
            gender: row.get(3)?,
            phone_number: row.get(4)?,
            provider: row.get(5)?,
            profile_image: row.get(6)?,
            is_staff: row.get::<_, i32>(7)? != 0,
            is_active: row.get::<_, i32>(8)? != 0,
            rank: row.get(9)?,
            feed_count: row.get(10)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            last_login: last_login_str.and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            }),
        })
    }
}
