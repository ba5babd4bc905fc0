//! churn-api library interface
//!
//! Exposes the router and its state for the binary and for integration tests.

pub mod api;
pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::batch::JobManager;
use crate::pipeline::Pipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Immutable scoring pipeline; `None` when the model failed to load
    pub pipeline: Option<Arc<Pipeline>>,
    /// Batch job lifecycle and durable status
    pub jobs: JobManager,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: Option<Arc<Pipeline>>, jobs: JobManager) -> Self {
        Self {
            pipeline,
            jobs,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// The pipeline, or 503 when running without a model
    pub fn require_pipeline(&self) -> ApiResult<Arc<Pipeline>> {
        self.pipeline
            .clone()
            .ok_or_else(|| ApiError::ServiceUnavailable("Model is not loaded".to_string()))
    }

    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::predict_routes())
        .merge(api::batch_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
