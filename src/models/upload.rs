//! Represents a file received from a multipart request, staged in memory
//! until the upload pipeline has pushed it to the media store.

use bytes::Bytes;

/// One file extracted from a multipart body.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    /// Original filename supplied by the client.
    pub filename: String,

    /// Declared content type (e.g. "image/png").
    pub content_type: String,

    /// Raw file bytes.
    pub bytes: Bytes,
}

impl UploadedFile {
    /// True if the declared content type is an image MIME type.
    ///
    /// Checked before any remote call so non-images are rejected cheaply.
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn size_bytes(&self) -> i64 {
        self.bytes.len() as i64
    }
}
