//! Client for the remote media store holding the actual image bytes.
//!
//! `MediaStore` is the seam the upload pipeline and catalog service depend
//! on; `CloudinaryStore` is the production implementation speaking the
//! Cloudinary-style signed upload API over HTTP. Tests substitute a
//! recording mock behind the same trait.

use crate::models::upload::UploadedFile;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.cloudinary.com";

#[derive(Debug, Error)]
pub enum MediaStoreError {
    #[error("media store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("media store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("media store response missing field `{0}`")]
    MalformedResponse(&'static str),
}

/// Result of a successful upload: the two identifiers that must always be
/// persisted together.
#[derive(Clone, Debug)]
pub struct RemoteObject {
    /// Publicly resolvable URL for the stored bytes.
    pub url: String,
    /// The store's internal identifier, required to delete later.
    pub object_id: String,
}

/// Outcome of a remote delete. `NotFound` is not an error: the delete path
/// treats an already-gone object as acceptably deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Everything a client needs to push bytes straight to the media store,
/// bypassing this service for the transfer itself. The client posts the
/// resulting metadata back afterwards to get a record.
#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadGrant {
    pub cloud_name: String,
    pub api_key: String,
    pub signature: String,
    pub timestamp: i64,
    pub folder: String,
}

/// Issues signed grants for client-direct uploads. Pure computation, no
/// network.
pub trait UploadSigner: Send + Sync {
    fn grant(&self, folder: &str) -> UploadGrant;
}

/// Remote object storage for image payloads.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload raw bytes under `folder`, returning the public URL and the
    /// store's object id.
    async fn upload(
        &self,
        file: &UploadedFile,
        folder: &str,
    ) -> Result<RemoteObject, MediaStoreError>;

    /// Delete a previously uploaded object by its store id.
    async fn delete(&self, object_id: &str) -> Result<DeleteOutcome, MediaStoreError>;
}

/// Cloudinary-style media store client.
///
/// Requests are authenticated with the account's api key and a SHA-256
/// signature over the alphabetically sorted parameters plus the api secret.
#[derive(Clone)]
pub struct CloudinaryStore {
    client: reqwest::Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: Option<String>,
}

impl CloudinaryStore {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Point the client at a different API host. Used against local stand-ins.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sign the request parameters: sort by key, join as `k=v` pairs with
    /// `&`, append the api secret, hex-encode the SHA-256 digest.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by_key(|&(k, _)| k);
        let payload = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let digest = Sha256::digest(format!("{}{}", payload, self.api_secret));
        hex::encode(digest)
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.base_url, self.cloud_name, resource_type, action
        )
    }
}

impl UploadSigner for CloudinaryStore {
    /// Grant for a browser-side upload. The signed parameter set matches
    /// what the direct-upload endpoint expects: folder, resource type, and
    /// timestamp.
    fn grant(&self, folder: &str) -> UploadGrant {
        let timestamp = Utc::now().timestamp();
        let ts = timestamp.to_string();
        let signature = self.sign(&[
            ("folder", folder),
            ("resource_type", "auto"),
            ("timestamp", &ts),
        ]);
        UploadGrant {
            cloud_name: self.cloud_name.clone(),
            api_key: self.api_key.clone(),
            signature,
            timestamp,
            folder: folder.to_string(),
        }
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(
        &self,
        file: &UploadedFile,
        folder: &str,
    ) -> Result<RemoteObject, MediaStoreError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("folder", folder), ("timestamp", &timestamp)]);

        let part = reqwest::multipart::Part::stream(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str(&file.content_type)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("folder", folder.to_string());

        // "auto" lets the store detect the resource type from the payload.
        let response = self
            .client
            .post(self.endpoint("auto", "upload"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MediaStoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = response.json().await?;
        let url = body
            .secure_url
            .ok_or(MediaStoreError::MalformedResponse("secure_url"))?;
        let object_id = body
            .public_id
            .ok_or(MediaStoreError::MalformedResponse("public_id"))?;

        debug!("uploaded `{}` to media store as {}", file.filename, object_id);
        Ok(RemoteObject { url, object_id })
    }

    async fn delete(&self, object_id: &str) -> Result<DeleteOutcome, MediaStoreError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", object_id), ("timestamp", &timestamp)]);

        let response = self
            .client
            .post(self.endpoint("image", "destroy"))
            .form(&[
                ("public_id", object_id),
                ("api_key", &self.api_key),
                ("timestamp", &timestamp),
                ("signature", &signature),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MediaStoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: DestroyResponse = response.json().await?;
        match body.result.as_deref() {
            Some("ok") => Ok(DeleteOutcome::Deleted),
            Some("not found") => Ok(DeleteOutcome::NotFound),
            Some(other) => Err(MediaStoreError::Rejected {
                status: status.as_u16(),
                message: other.to_string(),
            }),
            None => Err(MediaStoreError::MalformedResponse("result")),
        }
    }
}
