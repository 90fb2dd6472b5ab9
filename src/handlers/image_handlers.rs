//! HTTP handlers for upload, list, delete, and spreadsheet export.
//! Parses multipart bodies into staged files and delegates every decision
//! to `CatalogService`; both upload routes share one handler.

use crate::{
    errors::AppError,
    models::upload::UploadedFile,
    services::{
        export_service::{self, SPREADSHEET_MIME},
        image_repository::NewImageRecord,
        media_store::UploadGrant,
    },
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::Field},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Fallback when a file part carries no declared content type.
const GENERIC_IMAGE_MIME: &str = "image/*";

/// `POST /api/upload` and `POST /api/upload/multiple`.
///
/// Field `image` carries a single file, `images`/`images[]` a batch, and the
/// optional text field `folder` overrides the configured destination folder.
/// The single field is checked first, so a request carrying both is treated
/// as a single upload.
pub async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut single: Option<UploadedFile> = None;
    let mut batch: Vec<UploadedFile> = Vec::new();
    let mut folder: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("Error parsing form data: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => single = Some(read_file_field(field).await?),
            "images" | "images[]" => batch.push(read_file_field(field).await?),
            "folder" => {
                folder = Some(field.text().await.map_err(|err| {
                    AppError::bad_request(format!("Error parsing form data: {err}"))
                })?);
            }
            _ => continue,
        }
    }

    if let Some(file) = single {
        let record = state.catalog.upload_one(file, folder.as_deref()).await?;
        return Ok(Json(json!({ "success": true, "data": record })).into_response());
    }

    if !batch.is_empty() {
        let records = state.catalog.upload_batch(batch, folder.as_deref()).await?;
        return Ok(Json(json!({
            "success": true,
            "count": records.len(),
            "data": records
        }))
        .into_response());
    }

    Err(AppError::bad_request("Please upload an image file"))
}

/// `GET /api/images` — the full catalog, newest first.
pub async fn list_images(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let records = state.catalog.list().await?;
    Ok(Json(json!({
        "success": true,
        "count": records.len(),
        "data": records
    })))
}

/// `DELETE /api/{id}` — remove the remote object, then the record.
///
/// An id that does not parse as a UUID cannot name any record, so it reports
/// not-found rather than a server error.
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::not_found("Image not found"))?;
    state.catalog.delete(id).await?;
    Ok(Json(json!({ "success": true, "data": {} })))
}

/// `GET /api/export/excel` — the catalog as a downloadable spreadsheet.
pub async fn export_excel(State(state): State<AppState>) -> Result<Response, AppError> {
    let records = state.catalog.list().await?;
    let buffer = export_service::render_workbook(&records)
        .map_err(|err| AppError::internal(format!("Server error during export: {err}")))?;
    tracing::info!("exported {} images to spreadsheet", records.len());

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_service::attachment_filename(Utc::now().date_naive())
    );

    let mut response = Response::new(Body::from(buffer));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(SPREADSHEET_MIME));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|err| AppError::internal(err.to_string()))?,
    );
    Ok(response)
}

/// Optional JSON body for the sign endpoint.
#[derive(Debug, Deserialize)]
pub struct SignUploadRequest {
    pub folder: Option<String>,
}

#[derive(Serialize)]
struct SignUploadResponse {
    success: bool,
    #[serde(flatten)]
    grant: UploadGrant,
}

/// `POST /api/cloudinary-sign` — issue a grant for a client-direct upload.
///
/// The browser uploads straight to the media store with these parameters,
/// then posts the resulting metadata to `/api/save-image`. The byte
/// transfer never touches this service.
pub async fn sign_upload(
    State(state): State<AppState>,
    body: Option<Json<SignUploadRequest>>,
) -> impl IntoResponse {
    let folder = body
        .and_then(|Json(req)| req.folder)
        .unwrap_or_else(|| state.catalog.default_folder().to_string());
    let grant = state.signer.grant(&folder);
    Json(SignUploadResponse {
        success: true,
        grant,
    })
}

/// JSON metadata posted back after a client-direct upload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveImageRequest {
    pub original_filename: Option<String>,
    pub remote_url: Option<String>,
    pub remote_object_id: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub content_type: Option<String>,
}

/// `POST /api/save-image` — persist the record for a client-direct upload.
///
/// The filename, URL, and object id must all be present and non-empty: a
/// record must never hold a URL without the object id the delete path
/// needs, or vice versa.
pub async fn save_image(
    State(state): State<AppState>,
    Json(body): Json<SaveImageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(original_filename), Some(remote_url), Some(remote_object_id)) = (
        non_empty(body.original_filename),
        non_empty(body.remote_url),
        non_empty(body.remote_object_id),
    ) else {
        return Err(AppError::bad_request("Missing required image data"));
    };

    let record = state
        .catalog
        .register_upload(NewImageRecord {
            original_filename,
            remote_url,
            remote_object_id,
            file_size_bytes: body.file_size_bytes.unwrap_or(0),
            content_type: body
                .content_type
                .unwrap_or_else(|| "image/jpeg".to_string()),
        })
        .await?;

    Ok(Json(json!({ "success": true, "data": record })))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `GET /` — plain liveness string.
pub async fn root() -> &'static str {
    "Image to Link API is running"
}

async fn read_file_field(field: Field<'_>) -> Result<UploadedFile, AppError> {
    let filename = field
        .file_name()
        .map(str::to_string)
        .unwrap_or_else(|| "unnamed".to_string());
    let content_type = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| GENERIC_IMAGE_MIME.to_string());
    let bytes = field
        .bytes()
        .await
        .map_err(|err| AppError::bad_request(format!("Error reading `{filename}`: {err}")))?;

    Ok(UploadedFile {
        filename,
        content_type,
        bytes,
    })
}
