//! Service info and health endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

const MODULE_NAME: &str = "churn-api";

/// Service info response
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub model_loaded: bool,
    pub endpoints: Vec<&'static str>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "UP" whenever the process is serving
    pub status: String,
    /// Scorer, scaler and thresholds are loaded
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Last error message if any (e.g. why the model failed to load)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /
pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: MODULE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: state.pipeline.is_some(),
        endpoints: vec![
            "GET /health",
            "POST /predict",
            "POST /batch",
            "GET /batch/:job_id/status",
            "GET /batch/:job_id/download",
        ],
    })
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: "UP".to_string(),
        model_loaded: state.pipeline.is_some(),
        model_version: state
            .pipeline
            .as_ref()
            .map(|p| p.model_version().to_string()),
        module: MODULE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        last_error,
    })
}

/// Build service info and health routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
}
