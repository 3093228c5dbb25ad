use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserSummary;

/// Lifecycle state of a feed. Transitions are one-directional toward
/// `Hidden`/`Deleted`, except `Draft -> Published`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Draft,
    Published,
    Hidden,
    Deleted,
}

impl FeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Hidden => "hidden",
            Self::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Option<FeedStatus> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "hidden" => Some(Self::Hidden),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Whether a status change is allowed. Re-asserting the current status
    /// is a no-op and always allowed.
    pub fn can_transition_to(&self, next: FeedStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            Self::Draft => matches!(next, Self::Published | Self::Hidden | Self::Deleted),
            Self::Published => matches!(next, Self::Hidden | Self::Deleted),
            Self::Hidden => matches!(next, Self::Deleted),
            Self::Deleted => false,
        }
    }
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self::Published
    }
}

/// A single user submission describing one artifact sighting.
#[derive(Debug, Clone, Serialize)]
pub struct Feed {
    pub id: String,
    pub user_id: String,
    /// Free-text label used as the aggregation key.
    pub artifact_name: String,
    pub status: FeedStatus,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Feed response with the author and attached images expanded.
#[derive(Debug, Clone, Serialize)]
pub struct FeedDetail {
    #[serde(flatten)]
    pub feed: Feed,
    pub user: UserSummary,
    pub images: Vec<FeedImage>,
}

/// An image attached to a feed. `order` is a zero-based sequence unique
/// within the owning feed; new uploads append after the current maximum.
#[derive(Debug, Clone, Serialize)]
pub struct FeedImage {
    pub id: String,
    pub feed_id: String,
    pub image_url: String,
    pub order: i64,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            FeedStatus::Draft,
            FeedStatus::Published,
            FeedStatus::Hidden,
            FeedStatus::Deleted,
        ] {
            assert_eq!(FeedStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(FeedStatus::from_str("archived"), None);
    }

    #[test]
    fn test_transitions_one_directional() {
        assert!(FeedStatus::Draft.can_transition_to(FeedStatus::Published));
        assert!(FeedStatus::Published.can_transition_to(FeedStatus::Hidden));
        assert!(FeedStatus::Published.can_transition_to(FeedStatus::Deleted));
        assert!(FeedStatus::Hidden.can_transition_to(FeedStatus::Deleted));

        assert!(!FeedStatus::Published.can_transition_to(FeedStatus::Draft));
        assert!(!FeedStatus::Hidden.can_transition_to(FeedStatus::Published));
        assert!(!FeedStatus::Deleted.can_transition_to(FeedStatus::Published));
        assert!(!FeedStatus::Deleted.can_transition_to(FeedStatus::Draft));
    }
}
