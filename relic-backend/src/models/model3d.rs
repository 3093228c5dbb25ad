use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<ModelStatus> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Pending and processing models occupy the single in-flight slot an
    /// artifact is allowed.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl Default for ModelStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Glb,
    Gltf,
    Other,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Glb => "glb",
            Self::Gltf => "gltf",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<FileFormat> {
        match s {
            "glb" => Some(Self::Glb),
            "gltf" => Some(Self::Gltf),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl Default for FileFormat {
    fn default() -> Self {
        Self::Glb
    }
}

/// A 3D reconstruction of an artifact. Generation itself runs out of
/// process; this record only tracks the request and its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Model3D {
    pub id: String,
    pub artifact_id: String,
    pub model_url: String,
    pub thumbnail_url: Option<String>,
    pub file_format: FileFormat,
    pub poly_count: Option<i64>,
    pub file_size: Option<i64>,
    pub status: ModelStatus,
    pub description: Option<String>,
    pub processing_time: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Original photo used as input for a 3D reconstruction.
#[derive(Debug, Clone, Serialize)]
pub struct SourceImage {
    pub id: String,
    pub model_id: String,
    pub image_url: String,
    pub order: i64,
    pub created_at: DateTime<Utc>,
}
