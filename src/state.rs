use crate::{
    config::EnvStatus,
    services::{catalog_service::CatalogService, media_store::UploadSigner},
};
use std::sync::Arc;

/// Shared state handed to every handler: the catalog service, the signer
/// for client-direct uploads, and the configured/missing flags the health
/// probe reports.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub signer: Arc<dyn UploadSigner>,
    pub env: EnvStatus,
}
