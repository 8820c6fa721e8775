//! drumsep-web library interface
//!
//! Exposes the pipeline and router for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;

pub use crate::config::SeparationConfig;
pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::api::flash::FlashStore;
use crate::pipeline::BatchCoordinator;

/// Request body limit used when none is configured
pub const DEFAULT_UPLOAD_LIMIT_BYTES: usize = 1024 * 1024 * 1024;

/// Request body limit for a size in megabytes, saturating on overflow
pub fn upload_limit_from_mb(megabytes: usize) -> usize {
    megabytes.saturating_mul(1024 * 1024)
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Runs uploaded batches through the pipeline
    pub coordinator: Arc<BatchCoordinator>,
    /// Messages shown once on the next status page view
    pub flash: FlashStore,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Most recent environment-class failure, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
    /// Request body limit for upload routes
    pub upload_limit_bytes: usize,
}

impl AppState {
    pub fn new(coordinator: BatchCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            flash: FlashStore::default(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
            upload_limit_bytes: DEFAULT_UPLOAD_LIMIT_BYTES,
        }
    }

    pub fn with_upload_limit(mut self, bytes: usize) -> Self {
        self.upload_limit_bytes = bytes;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ui_routes())
        .merge(api::upload_routes(state.upload_limit_bytes))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limit_converts_megabytes() {
        assert_eq!(upload_limit_from_mb(1024), DEFAULT_UPLOAD_LIMIT_BYTES);
        assert_eq!(upload_limit_from_mb(0), 0);
    }

    #[test]
    fn upload_limit_saturates_instead_of_overflowing() {
        assert_eq!(upload_limit_from_mb(usize::MAX), usize::MAX);
        assert_eq!(upload_limit_from_mb(usize::MAX / 1024), usize::MAX);
    }
}
