//! Defines routes for the image upload and catalog API.
//!
//! ## Structure
//! - `POST   /api/upload`          — upload a single image (field `image`)
//! - `POST   /api/upload/multiple` — upload a batch (field `images`/`images[]`)
//! - `POST   /api/cloudinary-sign` — signed grant for a client-direct upload
//! - `POST   /api/save-image`      — persist metadata for a direct upload
//! - `GET    /api/images`          — list all records, newest first
//! - `DELETE /api/{id}`            — delete one record (remote object first)
//! - `GET    /api/export/excel`    — catalog as an xlsx download
//! - `GET    /health`              — environment/readiness probe
//! - `GET    /`                    — plain info string
//!
//! Every route sits behind a CORS layer that mirrors the request origin and
//! allows credentials; preflight `OPTIONS` requests are answered by the
//! layer without reaching a handler.

use crate::{
    handlers::{
        health_handlers::health,
        image_handlers::{
            delete_image, export_excel, list_images, root, save_image, sign_upload, upload_images,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    routing::{delete, get, post},
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

/// Build the router for all API routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/upload", post(upload_images))
        .route("/api/upload/multiple", post(upload_images))
        .route("/api/cloudinary-sign", post(sign_upload))
        .route("/api/save-image", post(save_image))
        .route("/api/images", get(list_images))
        .route("/api/export/excel", get(export_excel))
        .route("/api/{id}", delete(delete_image))
}

/// Assemble the full application: routes, state, CORS, and the configured
/// multipart body limit (`0` disables the limit entirely).
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request());

    let body_limit = if max_upload_bytes == 0 {
        DefaultBodyLimit::disable()
    } else {
        DefaultBodyLimit::max(max_upload_bytes)
    };

    routes().with_state(state).layer(cors).layer(body_limit)
}
