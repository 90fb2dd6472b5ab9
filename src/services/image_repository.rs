//! Metadata repository: CRUD over `ImageRecord` rows.
//!
//! Thin data-access layer over the shared SQLite pool. All ordering and
//! failure-mode policy lives in the catalog service; this module only moves
//! rows in and out of the `images` table.

use crate::models::image::ImageRecord;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Fields the upload pipeline supplies when persisting a record. The id and
/// timestamp are assigned here on insert.
#[derive(Clone, Debug)]
pub struct NewImageRecord {
    pub original_filename: String,
    pub remote_url: String,
    pub remote_object_id: String,
    pub file_size_bytes: i64,
    pub content_type: String,
}

#[derive(Clone)]
pub struct ImageRepository {
    db: Arc<SqlitePool>,
}

impl ImageRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a new record, assigning its id and upload timestamp.
    pub async fn create(&self, new: NewImageRecord) -> Result<ImageRecord, sqlx::Error> {
        let record = ImageRecord {
            id: Uuid::new_v4(),
            original_filename: new.original_filename,
            remote_url: new.remote_url,
            remote_object_id: new.remote_object_id,
            upload_timestamp: Utc::now(),
            file_size_bytes: new.file_size_bytes.max(0),
            content_type: new.content_type,
        };

        sqlx::query(
            "INSERT INTO images (
                id, original_filename, remote_url, remote_object_id,
                upload_timestamp, file_size_bytes, content_type
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(&record.original_filename)
        .bind(&record.remote_url)
        .bind(&record.remote_object_id)
        .bind(record.upload_timestamp)
        .bind(record.file_size_bytes)
        .bind(&record.content_type)
        .execute(&*self.db)
        .await?;

        Ok(record)
    }

    /// All records, newest upload first. Full scan, no pagination.
    pub async fn find_all(&self) -> Result<Vec<ImageRecord>, sqlx::Error> {
        sqlx::query_as::<_, ImageRecord>(
            "SELECT id, original_filename, remote_url, remote_object_id,
                    upload_timestamp, file_size_bytes, content_type
             FROM images
             ORDER BY upload_timestamp DESC",
        )
        .fetch_all(&*self.db)
        .await
    }

    /// Fetch a single record, or None if the id is unknown.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ImageRecord>, sqlx::Error> {
        sqlx::query_as::<_, ImageRecord>(
            "SELECT id, original_filename, remote_url, remote_object_id,
                    upload_timestamp, file_size_bytes, content_type
             FROM images
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await
    }

    /// Remove a record by id. Returns true if a row was deleted.
    pub async fn delete_by_id(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Lightweight connectivity check used by the health probe.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await
            .map(|_| ())
    }
}
