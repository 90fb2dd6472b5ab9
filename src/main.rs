use anyhow::Result;
use image_linker::{
    config::AppConfig,
    routes,
    services::{
        catalog_service::CatalogService,
        image_repository::ImageRepository,
        media_store::{CloudinaryStore, UploadSigner},
    },
    state::AppState,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting image-linker on {}", cfg.addr());

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    tracing::debug!("Connecting using raw URL => {}", db_url);

    // Extract the local file path SQLx will use
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    // The pool is created once here and shared for the process lifetime; no
    // handler ever reconnects.
    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?,
    );

    run_migrations(&db).await?;

    // --- Initialize core services ---
    let store = CloudinaryStore::new(
        cfg.media_cloud_name.clone(),
        cfg.media_api_key.clone(),
        cfg.media_api_secret.clone(),
    );
    let signer: Arc<dyn UploadSigner> = Arc::new(store.clone());
    let catalog = CatalogService::new(
        Arc::new(store),
        ImageRepository::new(db),
        cfg.upload_folder.clone(),
    );
    let state = AppState {
        catalog,
        signer,
        env: cfg.env_status(),
    };

    // --- Build router ---
    let app = routes::routes::app(state, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Apply the embedded schema at startup. Statements are idempotent
/// (`IF NOT EXISTS`), so rerunning on every boot is safe.
async fn run_migrations(db: &Arc<sqlx::Pool<sqlx::Sqlite>>) -> Result<()> {
    let sql = include_str!("../migrations/0001_init.sql");
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::debug!("Running {} migration statements...", statements.len());

    for stmt in statements {
        sqlx::query(stmt).execute(&**db).await?;
    }

    Ok(())
}
