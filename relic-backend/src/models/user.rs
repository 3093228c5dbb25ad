use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user. The password hash never leaves the database layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub gender: Option<String>,
    pub phone_number: Option<String>,
    pub provider: String,
    pub profile_image: Option<String>,
    pub is_staff: bool,
    pub is_active: bool,
    /// Contribution tier, always `rank_for(feed_count)`.
    pub rank: i32,
    /// Published feed counter maintained by the feed lifecycle.
    pub feed_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Minimal author info embedded in feed responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub profile_image: Option<String>,
    pub rank: i32,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id.clone(),
            username: user.username.clone(),
            profile_image: user.profile_image.clone(),
            rank: user.rank,
        }
    }
}

/// Opaque API token, one per user, created on first login.
#[derive(Debug, Clone, Serialize)]
pub struct AuthToken {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}
