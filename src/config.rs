use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Media store account (Cloudinary-style cloud name).
    pub media_cloud_name: String,
    pub media_api_key: String,
    pub media_api_secret: String,
    /// Destination folder for uploads when the request names none.
    pub upload_folder: String,
    /// Maximum multipart payload size in bytes; 0 disables the limit.
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Image upload and catalog API")]
pub struct Args {
    /// Host to bind to (overrides IMAGE_LINKER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides IMAGE_LINKER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides IMAGE_LINKER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Default media store folder (overrides IMAGE_LINKER_UPLOAD_FOLDER)
    #[arg(long)]
    pub upload_folder: Option<String>,

    /// Max upload payload in bytes, 0 for unlimited (overrides IMAGE_LINKER_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    ///
    /// Media store credentials come from the CLOUDINARY_* variables only;
    /// missing ones default to empty and are reported by the health probe
    /// rather than failing startup.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("IMAGE_LINKER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("IMAGE_LINKER_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing IMAGE_LINKER_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 5003,
            Err(err) => return Err(err).context("reading IMAGE_LINKER_PORT"),
        };
        let env_db = env::var("IMAGE_LINKER_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/image_linker.db".into());
        let env_folder =
            env::var("IMAGE_LINKER_UPLOAD_FOLDER").unwrap_or_else(|_| "image-to-link".into());
        let env_max_bytes = match env::var("IMAGE_LINKER_MAX_UPLOAD_BYTES") {
            Ok(value) => value.parse::<usize>().with_context(|| {
                format!("parsing IMAGE_LINKER_MAX_UPLOAD_BYTES value `{}`", value)
            })?,
            Err(env::VarError::NotPresent) => 100 * 1024 * 1024,
            Err(err) => return Err(err).context("reading IMAGE_LINKER_MAX_UPLOAD_BYTES"),
        };

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            media_cloud_name: env::var("CLOUDINARY_CLOUD_NAME").unwrap_or_default(),
            media_api_key: env::var("CLOUDINARY_API_KEY").unwrap_or_default(),
            media_api_secret: env::var("CLOUDINARY_API_SECRET").unwrap_or_default(),
            upload_folder: args.upload_folder.unwrap_or(env_folder),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_bytes),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-dependency configured flags, surfaced by `GET /health`.
    pub fn env_status(&self) -> EnvStatus {
        EnvStatus {
            database_url: !self.database_url.is_empty(),
            media_cloud_name: !self.media_cloud_name.is_empty(),
            media_api_key: !self.media_api_key.is_empty(),
            media_api_secret: !self.media_api_secret.is_empty(),
        }
    }
}

/// Which external-dependency settings are present.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct EnvStatus {
    pub database_url: bool,
    pub media_cloud_name: bool,
    pub media_api_key: bool,
    pub media_api_secret: bool,
}

impl EnvStatus {
    pub fn all_set(&self) -> bool {
        self.database_url && self.media_cloud_name && self.media_api_key && self.media_api_secret
    }
}
