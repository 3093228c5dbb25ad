use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review state of an aggregated artifact record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    AutoGenerated,
    Verified,
    Featured,
    Rejected,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoGenerated => "auto_generated",
            Self::Verified => "verified",
            Self::Featured => "featured",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<ArtifactStatus> {
        match s {
            "auto_generated" => Some(Self::AutoGenerated),
            "verified" => Some(Self::Verified),
            "featured" => Some(Self::Featured),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl Default for ArtifactStatus {
    fn default() -> Self {
        Self::AutoGenerated
    }
}

/// Aggregated, de-duplicated record representing a real-world object,
/// derived from the published feeds sharing its name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub id: String,
    /// Aggregation key, unique across artifacts.
    pub name: String,
    pub description: Option<String>,
    pub time_period: Option<String>,
    pub estimated_year: Option<String>,
    pub origin_location: Option<String>,
    pub status: ArtifactStatus,
    /// Cached sum of image counts across linked feeds; derived, not
    /// authoritative. Refreshed on every reconcile.
    pub image_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Join row linking an artifact to one contributing feed. The
/// (artifact_id, feed_id) pair is unique.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactFeed {
    pub id: String,
    pub artifact_id: String,
    pub feed_id: String,
    pub created_at: DateTime<Utc>,
}
