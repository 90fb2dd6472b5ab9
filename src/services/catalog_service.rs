//! Catalog service: the upload-and-persist pipeline plus list/delete.
//!
//! Ordering contracts enforced here:
//! - a metadata record is created only after the remote upload succeeded;
//! - a metadata write failure after a successful upload leaves an orphaned
//!   remote object, which is surfaced as an error and logged, never hidden;
//! - delete removes the remote object first and the metadata row second, so
//!   a partial failure leaves at worst stale metadata pointing at a missing
//!   object instead of an unreachable remote object with no record.

use crate::{
    models::{image::ImageRecord, upload::UploadedFile},
    services::{
        image_repository::{ImageRepository, NewImageRecord},
        media_store::{DeleteOutcome, MediaStore, MediaStoreError},
    },
};
use futures::{StreamExt, stream::FuturesUnordered};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One failed file in a batch upload, reported back to the caller.
/// `client_error` marks failures caused by the request itself (e.g. a
/// non-image file) as opposed to a dependency failing.
#[derive(Clone, Debug)]
pub struct BatchFailure {
    pub filename: String,
    pub reason: String,
    pub client_error: bool,
}

fn format_failures(failures: &[BatchFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("`{}` ({})", f.filename, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("`{0}` is not an image file")]
    NotAnImage(String),
    #[error("image {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    MediaStore(#[from] MediaStoreError),
    #[error("metadata write failed for `{filename}`: {source}")]
    MetadataWrite {
        filename: String,
        source: sqlx::Error,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("batch upload failed for {}", format_failures(.0))]
    BatchUpload(Vec<BatchFailure>),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Orchestrates uploads, listing, and deletion over the media store and the
/// metadata repository. Cheap to clone; all handlers share one instance.
#[derive(Clone)]
pub struct CatalogService {
    media: Arc<dyn MediaStore>,
    repo: ImageRepository,
    default_folder: String,
}

impl CatalogService {
    pub fn new(
        media: Arc<dyn MediaStore>,
        repo: ImageRepository,
        default_folder: impl Into<String>,
    ) -> Self {
        Self {
            media,
            repo,
            default_folder: default_folder.into(),
        }
    }

    pub fn repository(&self) -> &ImageRepository {
        &self.repo
    }

    pub fn default_folder(&self) -> &str {
        &self.default_folder
    }

    /// Persist a record for a file the client pushed to the media store
    /// itself using a signed grant. The remote object already exists, so
    /// this is only the metadata half of the pipeline; the caller vouches
    /// for the url/object-id pair it hands in.
    pub async fn register_upload(&self, new: NewImageRecord) -> CatalogResult<ImageRecord> {
        let record = self.repo.create(new).await?;
        info!(
            "registered direct upload {} for `{}`",
            record.id, record.original_filename
        );
        Ok(record)
    }

    /// Upload one file and persist its record.
    ///
    /// Non-images are rejected before any remote call. The record write only
    /// happens after the media store accepted the bytes.
    pub async fn upload_one(
        &self,
        file: UploadedFile,
        folder: Option<&str>,
    ) -> CatalogResult<ImageRecord> {
        if !file.is_image() {
            return Err(CatalogError::NotAnImage(file.filename));
        }

        let folder = folder.unwrap_or(&self.default_folder);
        info!(
            "uploading `{}` ({} bytes) to folder `{}`",
            file.filename,
            file.size_bytes(),
            folder
        );

        let remote = self.media.upload(&file, folder).await?;
        debug!("media store accepted `{}` as {}", file.filename, remote.object_id);

        // From here on a failure orphans the remote object: there is no
        // compensating delete, only the error and this log line to find it.
        let record = self
            .repo
            .create(NewImageRecord {
                original_filename: file.filename.clone(),
                remote_url: remote.url,
                remote_object_id: remote.object_id.clone(),
                file_size_bytes: file.size_bytes(),
                content_type: file.content_type.clone(),
            })
            .await
            .map_err(|source| {
                error!(
                    "metadata write failed for `{}`; remote object {} is orphaned: {}",
                    file.filename, remote.object_id, source
                );
                CatalogError::MetadataWrite {
                    filename: file.filename.clone(),
                    source,
                }
            })?;

        info!("saved record {} for `{}`", record.id, record.original_filename);
        Ok(record)
    }

    /// Upload a batch of files concurrently.
    ///
    /// Files are processed independently; records are returned in completion
    /// order. The call succeeds only if every file succeeded. On failure the
    /// error names each failed file; records already written for successful
    /// files are kept (no rollback) and remain visible via `list`.
    pub async fn upload_batch(
        &self,
        files: Vec<UploadedFile>,
        folder: Option<&str>,
    ) -> CatalogResult<Vec<ImageRecord>> {
        info!("uploading batch of {} files", files.len());

        let mut tasks: FuturesUnordered<_> = files
            .into_iter()
            .map(|file| {
                let service = self.clone();
                let folder = folder.map(str::to_string);
                async move {
                    let filename = file.filename.clone();
                    let result = service.upload_one(file, folder.as_deref()).await;
                    (filename, result)
                }
            })
            .collect();

        let mut records = Vec::new();
        let mut failures = Vec::new();
        while let Some((filename, result)) = tasks.next().await {
            match result {
                Ok(record) => records.push(record),
                Err(err) => failures.push(BatchFailure {
                    filename,
                    reason: err.to_string(),
                    client_error: matches!(err, CatalogError::NotAnImage(_)),
                }),
            }
        }

        if failures.is_empty() {
            info!("batch upload complete: {} records", records.len());
            Ok(records)
        } else {
            warn!(
                "batch upload failed for {} of {} files",
                failures.len(),
                failures.len() + records.len()
            );
            Err(CatalogError::BatchUpload(failures))
        }
    }

    /// All records, newest first.
    pub async fn list(&self) -> CatalogResult<Vec<ImageRecord>> {
        Ok(self.repo.find_all().await?)
    }

    /// Delete a record and its remote object, remote side first.
    ///
    /// An "already gone" remote outcome still removes the record. A hard
    /// remote failure aborts and retains the record so the delete can be
    /// retried.
    pub async fn delete(&self, id: Uuid) -> CatalogResult<ImageRecord> {
        let record = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(CatalogError::NotFound(id))?;

        info!("deleting image `{}` ({})", record.original_filename, id);

        match self.media.delete(&record.remote_object_id).await? {
            DeleteOutcome::Deleted => {
                debug!("remote object {} deleted", record.remote_object_id);
            }
            DeleteOutcome::NotFound => {
                warn!(
                    "remote object {} already missing; removing record anyway",
                    record.remote_object_id
                );
            }
        }

        self.repo.delete_by_id(id).await?;
        Ok(record)
    }
}
