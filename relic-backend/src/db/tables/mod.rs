//! Database table modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for a specific
//! table group.

pub mod artifacts;  // artifacts, artifact_feeds
mod auth;       // auth_tokens
pub mod feeds;  // feeds, feed_images
pub mod models3d;   // models3d, model_source_images
pub mod users;  // users
