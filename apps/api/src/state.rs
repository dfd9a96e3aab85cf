use std::sync::Arc;

use crate::config::Config;
use crate::jobs::ComputeJobService;
use crate::storage::BlobStore;

/// Shared application state injected into all route handlers via Axum extractors.
/// Holds clients only; model artifacts are read per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub compute: Arc<dyn ComputeJobService>,
    pub config: Config,
}
