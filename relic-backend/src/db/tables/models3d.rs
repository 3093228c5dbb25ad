//! 3D model and source image table operations

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use super::super::Database;
use crate::models::{FileFormat, Model3D, ModelStatus, SourceImage};

const MODEL_COLUMNS: &str = "id, artifact_id, model_url, thumbnail_url, file_format, \
     poly_count, file_size, status, description, processing_time, created_at, updated_at";

/// Fields reported back by the reconstruction pipeline alongside a status
/// change.
#[derive(Debug, Default)]
pub struct ModelStatusUpdate<'a> {
    pub status: ModelStatus,
    pub model_url: Option<&'a str>,
    pub thumbnail_url: Option<&'a str>,
    pub poly_count: Option<i64>,
    pub file_size: Option<i64>,
    pub processing_time: Option<i64>,
}

impl Database {
    /// The model currently occupying the artifact's single in-flight slot,
    /// if any.
    pub fn find_active_model(&self, artifact_id: &str) -> SqliteResult<Option<Model3D>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MODEL_COLUMNS} FROM models3d
             WHERE artifact_id = ?1 AND status IN ('pending', 'processing')
             LIMIT 1"
        ))?;
        let model = stmt
            .query_row([artifact_id], |row| Self::row_to_model(row))
            .ok();
        Ok(model)
    }

    pub fn insert_model_request(
        &self,
        artifact_id: &str,
        file_format: FileFormat,
        description: Option<&str>,
    ) -> SqliteResult<Model3D> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute(
            "INSERT INTO models3d (id, artifact_id, file_format, status, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?5)",
            rusqlite::params![&id, artifact_id, file_format.as_str(), description, &now_str],
        )?;

        Ok(Model3D {
            id,
            artifact_id: artifact_id.to_string(),
            model_url: String::new(),
            thumbnail_url: None,
            file_format,
            poly_count: None,
            file_size: None,
            status: ModelStatus::Pending,
            description: description.map(|s| s.to_string()),
            processing_time: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_model(&self, model_id: &str) -> SqliteResult<Option<Model3D>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MODEL_COLUMNS} FROM models3d WHERE id = ?1"
        ))?;
        let model = stmt
            .query_row([model_id], |row| Self::row_to_model(row))
            .ok();
        Ok(model)
    }

    /// Newest-first model listing, optionally restricted to one status.
    pub fn list_models(&self, status: Option<ModelStatus>) -> SqliteResult<Vec<Model3D>> {
        let conn = self.conn.lock().unwrap();
        let models = match status {
            Some(s) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MODEL_COLUMNS} FROM models3d WHERE status = ?1
                     ORDER BY created_at DESC"
                ))?;
                let rows = stmt
                    .query_map([s.as_str()], |row| Self::row_to_model(row))?
                    .filter_map(|r| r.ok())
                    .collect();
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MODEL_COLUMNS} FROM models3d ORDER BY created_at DESC"
                ))?;
                let rows = stmt
                    .query_map([], |row| Self::row_to_model(row))?
                    .filter_map(|r| r.ok())
                    .collect();
                rows
            }
        };
        Ok(models)
    }

    pub fn list_models_for_artifact(
        &self,
        artifact_id: &str,
        status: Option<ModelStatus>,
    ) -> SqliteResult<Vec<Model3D>> {
        let conn = self.conn.lock().unwrap();
        let models = match status {
            Some(s) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MODEL_COLUMNS} FROM models3d
                     WHERE artifact_id = ?1 AND status = ?2
                     ORDER BY created_at DESC"
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![artifact_id, s.as_str()], |row| {
                        Self::row_to_model(row)
                    })?
                    .filter_map(|r| r.ok())
                    .collect();
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MODEL_COLUMNS} FROM models3d WHERE artifact_id = ?1
                     ORDER BY created_at DESC"
                ))?;
                let rows = stmt
                    .query_map([artifact_id], |row| Self::row_to_model(row))?
                    .filter_map(|r| r.ok())
                    .collect();
                rows
            }
        };
        Ok(models)
    }

    pub fn update_model_status(
        &self,
        model_id: &str,
        update: &ModelStatusUpdate,
    ) -> SqliteResult<Option<Model3D>> {
        {
            let conn = self.conn.lock().unwrap();
            let now = Utc::now().to_rfc3339();
            let changed = conn.execute(
                "UPDATE models3d SET
                    status = ?1,
                    model_url = COALESCE(?2, model_url),
                    thumbnail_url = COALESCE(?3, thumbnail_url),
                    poly_count = COALESCE(?4, poly_count),
                    file_size = COALESCE(?5, file_size),
                    processing_time = COALESCE(?6, processing_time),
                    updated_at = ?7
                 WHERE id = ?8",
                rusqlite::params![
                    update.status.as_str(),
                    update.model_url,
                    update.thumbnail_url,
                    update.poly_count,
                    update.file_size,
                    update.processing_time,
                    &now,
                    model_id
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
        }
        self.get_model(model_id)
    }

    /// Snapshot the reconstruction inputs for a model, one transaction.
    pub fn insert_source_images(
        &self,
        model_id: &str,
        images: &[(i64, String)],
    ) -> SqliteResult<Vec<SourceImage>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let mut created = Vec::with_capacity(images.len());
        for (order, url) in images {
            let id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO model_source_images (id, model_id, image_url, ord, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![&id, model_id, url, order, &now_str],
            )?;
            created.push(SourceImage {
                id,
                model_id: model_id.to_string(),
                image_url: url.clone(),
                order: *order,
                created_at: now,
            });
        }

        tx.commit()?;
        Ok(created)
    }

    pub fn list_source_images(&self, model_id: &str) -> SqliteResult<Vec<SourceImage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, model_id, image_url, ord, created_at
             FROM model_source_images WHERE model_id = ?1 ORDER BY ord ASC",
        )?;
        let images = stmt
            .query_map([model_id], |row| {
                let created_at_str: String = row.get(4)?;
                Ok(SourceImage {
                    id: row.get(0)?,
                    model_id: row.get(1)?,
                    image_url: row.get(2)?,
                    order: row.get(3)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at_str)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(images)
    }

    fn row_to_model(row: &rusqlite::Row) -> rusqlite::Result<Model3D> {
        let format_str: String = row.get(4)?;
        let status_str: String = row.get(7)?;
        let created_at_str: String = row.get(10)?;
        let updated_at_str: String = row.get(11)?;

        Ok(Model3D {
            id: row.get(0)?,
            artifact_id: row.get(1)?,
            model_url: row.get(2)?,
            thumbnail_url: row.get(3)?,
            file_format: FileFormat::from_str(&format_str).unwrap_or_default(),
            poly_count: row.get(5)?,
            file_size: row.get(6)?,
            status: ModelStatus::from_str(&status_str).unwrap_or_default(),
            description: row.get(8)?,
            processing_time: row.get(9)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_artifact() -> (Database, String) {
        let db = Database::new(":memory:").unwrap();
        let user = db
            .create_user("a@example.com", "a", "h", None, None, "local")
            .unwrap();
        let feed = db
            .create_feed(&user.id, "bell", crate::models::FeedStatus::Published)
            .unwrap();
        let artifact = db
            .create_artifact_with_links("bell", 10, &[feed.id])
            .unwrap();
        (db, artifact.id)
    }

    #[test]
    fn test_active_model_tracking() {
        let (db, artifact_id) = db_with_artifact();
        assert!(db.find_active_model(&artifact_id).unwrap().is_none());

        let model = db
            .insert_model_request(&artifact_id, FileFormat::Glb, None)
            .unwrap();
        assert_eq!(
            db.find_active_model(&artifact_id).unwrap().map(|m| m.id),
            Some(model.id.clone())
        );

        db.update_model_status(
            &model.id,
            &ModelStatusUpdate {
                status: ModelStatus::Completed,
                model_url: Some("/media/models/bell.glb"),
                processing_time: Some(420),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert!(db.find_active_model(&artifact_id).unwrap().is_none());

        let done = db.get_model(&model.id).unwrap().unwrap();
        assert_eq!(done.status, ModelStatus::Completed);
        assert_eq!(done.model_url, "/media/models/bell.glb");
        assert_eq!(done.processing_time, Some(420));
    }

    #[test]
    fn test_listing_filters_by_status() {
        let (db, artifact_id) = db_with_artifact();
        let m1 = db
            .insert_model_request(&artifact_id, FileFormat::Glb, None)
            .unwrap();
        db.update_model_status(
            &m1.id,
            &ModelStatusUpdate {
                status: ModelStatus::Failed,
                ..Default::default()
            },
        )
        .unwrap();
        db.insert_model_request(&artifact_id, FileFormat::Gltf, None)
            .unwrap();

        assert_eq!(db.list_models(None).unwrap().len(), 2);
        assert_eq!(
            db.list_models(Some(ModelStatus::Failed)).unwrap().len(),
            1
        );
        assert_eq!(
            db.list_models_for_artifact(&artifact_id, Some(ModelStatus::Pending))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_source_image_snapshot() {
        let (db, artifact_id) = db_with_artifact();
        let model = db
            .insert_model_request(&artifact_id, FileFormat::Glb, None)
            .unwrap();
        db.insert_source_images(
            &model.id,
            &[(0, "/a.jpg".to_string()), (1, "/b.jpg".to_string())],
        )
        .unwrap();

        let images = db.list_source_images(&model.id).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].order, 0);
        assert_eq!(images[1].image_url, "/b.jpg");
    }
}
