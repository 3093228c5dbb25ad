mod sqlite;
mod tables;

pub use sqlite::Database;
pub use tables::artifacts::ArtifactUpdate;
pub use tables::feeds::NewFeedImage;
pub use tables::models3d::ModelStatusUpdate;
pub use tables::users::UserUpdate;
