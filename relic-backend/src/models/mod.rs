//! Domain model structs shared between the database layer and controllers.

mod artifact;
mod feed;
mod model3d;
mod user;

pub use artifact::{Artifact, ArtifactFeed, ArtifactStatus};
pub use feed::{Feed, FeedDetail, FeedImage, FeedStatus};
pub use model3d::{FileFormat, Model3D, ModelStatus, SourceImage};
pub use user::{AuthToken, User, UserSummary};
