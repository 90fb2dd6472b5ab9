//! Represents the metadata record for one uploaded image.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Persisted description of a single uploaded image.
///
/// The record stores where the bytes live in the remote media store, never
/// the bytes themselves. `remote_url` and `remote_object_id` are always set
/// together: the URL is what clients consume, the object id is what the
/// delete path needs to locate the remote object.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Unique identifier, assigned by the repository on creation.
    pub id: Uuid,

    /// Filename as supplied by the uploading client.
    pub original_filename: String,

    /// Publicly resolvable URL returned by the media store.
    pub remote_url: String,

    /// The media store's internal identifier, required for delete.
    pub remote_object_id: String,

    /// When the upload completed. Immutable after creation.
    pub upload_timestamp: DateTime<Utc>,

    /// Size in bytes (0 if the client did not report one).
    pub file_size_bytes: i64,

    /// Declared MIME type of the uploaded file.
    pub content_type: String,
}
