use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{self, Request, StatusCode};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use image_linker::config::EnvStatus;
use image_linker::models::upload::UploadedFile;
use image_linker::routes::routes::app;
use image_linker::services::catalog_service::CatalogService;
use image_linker::services::image_repository::ImageRepository;
use image_linker::services::media_store::{
    CloudinaryStore, DeleteOutcome, MediaStore, MediaStoreError, RemoteObject, UploadSigner,
};
use image_linker::state::AppState;

// -- Mock media store -----------------------------------------------------

struct MockMediaStore {
    deletes: Mutex<Vec<String>>,
}

impl MockMediaStore {
    fn new() -> Self {
        Self {
            deletes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MediaStore for MockMediaStore {
    async fn upload(
        &self,
        file: &UploadedFile,
        folder: &str,
    ) -> Result<RemoteObject, MediaStoreError> {
        Ok(RemoteObject {
            url: format!("https://cdn.example/{}/{}", folder, file.filename),
            object_id: format!("{}/{}", folder, file.filename),
        })
    }

    async fn delete(&self, object_id: &str) -> Result<DeleteOutcome, MediaStoreError> {
        self.deletes.lock().unwrap().push(object_id.to_string());
        Ok(DeleteOutcome::Deleted)
    }
}

// -- Helpers --------------------------------------------------------------

const BOUNDARY: &str = "image-linker-test-boundary";

async fn build_app() -> (axum::Router, Arc<MockMediaStore>) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    for stmt in include_str!("../migrations/0001_init.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sqlx::query(stmt).execute(&pool).await.expect("migration");
    }

    let store = Arc::new(MockMediaStore::new());
    let catalog = CatalogService::new(
        store.clone(),
        ImageRepository::new(Arc::new(pool)),
        "test-folder",
    );
    // The signer is pure computation, so the real client works in tests.
    let signer: Arc<dyn UploadSigner> =
        Arc::new(CloudinaryStore::new("demo-cloud", "demo-key", "demo-secret"));
    let state = AppState {
        catalog,
        signer,
        env: EnvStatus {
            database_url: true,
            media_cloud_name: true,
            media_api_key: true,
            media_api_secret: true,
        },
    };

    (app(state, 0), store)
}

fn push_file_part(body: &mut Vec<u8>, field: &str, filename: &str, mime: &str, data: &[u8]) {
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");
}

fn push_text_part(body: &mut Vec<u8>, field: &str, value: &str) {
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(value.as_bytes());
    body.extend_from_slice(b"\r\n");
}

fn close_body(body: &mut Vec<u8>) {
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: &axum::Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

// -- Tests ----------------------------------------------------------------

#[tokio::test]
async fn single_upload_then_list() {
    let (app, _) = build_app().await;

    let mut body = Vec::new();
    push_file_part(&mut body, "image", "cat.png", "image/png", b"fake png bytes");
    close_body(&mut body);

    let response = app
        .clone()
        .oneshot(multipart_request("/api/upload", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["originalFilename"], "cat.png");
    assert!(!json["data"]["remoteUrl"].as_str().unwrap().is_empty());
    assert!(!json["data"]["remoteObjectId"].as_str().unwrap().is_empty());

    let response = get(&app, "/api/images").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["data"][0]["originalFilename"], "cat.png");
}

#[tokio::test]
async fn folder_field_overrides_destination() {
    let (app, _) = build_app().await;

    let mut body = Vec::new();
    push_text_part(&mut body, "folder", "holiday");
    push_file_part(&mut body, "image", "cat.png", "image/png", b"bytes");
    close_body(&mut body);

    let response = app
        .oneshot(multipart_request("/api/upload", body))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["data"]["remoteObjectId"], "holiday/cat.png");
}

#[tokio::test]
async fn batch_upload_reports_count() {
    let (app, _) = build_app().await;

    let mut body = Vec::new();
    push_file_part(&mut body, "images[]", "a.png", "image/png", b"a");
    push_file_part(&mut body, "images[]", "b.png", "image/png", b"b");
    close_body(&mut body);

    let response = app
        .clone()
        .oneshot(multipart_request("/api/upload/multiple", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 2);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn upload_without_file_is_rejected() {
    let (app, _) = build_app().await;

    let mut body = Vec::new();
    push_text_part(&mut body, "folder", "holiday");
    close_body(&mut body);

    let response = app
        .oneshot(multipart_request("/api/upload", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let (app, _) = build_app().await;

    let mut body = Vec::new();
    push_file_part(&mut body, "image", "notes.txt", "text/plain", b"hello");
    close_body(&mut body);

    let response = app
        .oneshot(multipart_request("/api/upload", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_of_only_non_images_is_bad_request() {
    let (app, _) = build_app().await;

    let mut body = Vec::new();
    push_file_part(&mut body, "images[]", "a.txt", "text/plain", b"a");
    push_file_part(&mut body, "images[]", "b.txt", "text/plain", b"b");
    close_body(&mut body);

    let response = app
        .oneshot(multipart_request("/api/upload/multiple", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["success"], false);
}

fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn sign_endpoint_issues_direct_upload_grant() {
    let (app, _) = build_app().await;

    let response = app
        .clone()
        .oneshot(json_request("/api/cloudinary-sign", r#"{"folder":"direct"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["cloudName"], "demo-cloud");
    assert_eq!(json["apiKey"], "demo-key");
    assert_eq!(json["folder"], "direct");
    assert!(!json["signature"].as_str().unwrap().is_empty());
    assert!(json["timestamp"].as_i64().unwrap() > 0);

    // No body: the configured default folder is signed instead.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/cloudinary-sign")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["folder"], "test-folder");
}

#[tokio::test]
async fn save_image_persists_direct_upload_metadata() {
    let (app, _) = build_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "/api/save-image",
            r#"{
                "originalFilename": "direct.png",
                "remoteUrl": "https://cdn.example/direct/direct.png",
                "remoteObjectId": "direct/direct.png",
                "fileSizeBytes": 42,
                "contentType": "image/png"
            }"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["originalFilename"], "direct.png");
    assert_eq!(json["data"]["remoteObjectId"], "direct/direct.png");

    let response = get(&app, "/api/images").await;
    let json = json_body(response).await;
    assert_eq!(json["count"], 1);
}

#[tokio::test]
async fn save_image_rejects_missing_required_fields() {
    let (app, _) = build_app().await;

    // No remoteObjectId: the record would be undeletable.
    let response = app
        .clone()
        .oneshot(json_request(
            "/api/save-image",
            r#"{
                "originalFilename": "direct.png",
                "remoteUrl": "https://cdn.example/direct/direct.png"
            }"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(&app, "/api/images").await;
    let json = json_body(response).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn delete_removes_record_and_remote_object() {
    let (app, store) = build_app().await;

    let mut body = Vec::new();
    push_file_part(&mut body, "image", "cat.png", "image/png", b"bytes");
    close_body(&mut body);
    let response = app
        .clone()
        .oneshot(multipart_request("/api/upload", body))
        .await
        .unwrap();
    let json = json_body(response).await;
    let id = json["data"]["id"].as_str().unwrap().to_string();
    let object_id = json["data"]["remoteObjectId"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);

    assert_eq!(*store.deletes.lock().unwrap(), vec![object_id]);

    let response = get(&app, "/api/images").await;
    let json = json_body(response).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn delete_unknown_id_is_not_found() {
    let (app, store) = build_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/00000000-0000-0000-0000-000000000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(store.deletes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn wrong_method_on_upload_is_rejected() {
    let (app, _) = build_app().await;
    let response = get(&app, "/api/upload").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn preflight_mirrors_origin_and_allows_credentials() {
    let (app, _) = build_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/images")
                .header(http::header::ORIGIN, "https://example.test")
                .header("Access-Control-Request-Method", "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(
        headers["access-control-allow-origin"],
        "https://example.test"
    );
    assert_eq!(headers["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn export_sets_spreadsheet_headers() {
    let (app, _) = build_app().await;

    let response = get(&app, "/api/export/excel").await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(
        headers["content-type"],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    let disposition = headers["content-disposition"].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"image-urls-"));
    assert!(disposition.ends_with(".xlsx\""));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(!bytes.is_empty());
}

#[tokio::test]
async fn health_reports_configured_dependencies() {
    let (app, _) = build_app().await;

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["environment"]["media_cloud_name"], true);
    assert_eq!(json["database"]["ok"], true);
}
