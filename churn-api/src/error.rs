//! Error types for churn-api
//!
//! Every handler error leaves as the JSON envelope
//! `{"error": {"code": ..., "message": ...}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use churn_common::model::ModelError;
use churn_common::schema::ValidationError;
use serde_json::json;
use thiserror::Error;

use crate::batch::SubmitError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Record failed domain validation (422)
    #[error("Invalid record: {0}")]
    Unprocessable(#[from] ValidationError),

    /// Upload over the configured limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Upload is not CSV (415)
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Job exists but has no downloadable result (409)
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Model not loaded (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Scoring failure
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// churn-common error
    #[error("Common error: {0}")]
    Common(#[from] churn_common::Error),
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            SubmitError::Empty | SubmitError::Csv(_) | SubmitError::Stream(_) => {
                ApiError::BadRequest(err.to_string())
            }
            SubmitError::Invalid(e) => ApiError::BadRequest(format!("Invalid upload: {}", e)),
            SubmitError::ModelUnavailable => ApiError::ServiceUnavailable(err.to_string()),
            SubmitError::Io(e) => ApiError::Io(e),
            SubmitError::Store(e) => ApiError::Common(e),
            SubmitError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unprocessable(ref err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_RECORD",
                err.to_string(),
            ),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::UnsupportedMediaType(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                msg,
            ),
            ApiError::NotReady(msg) => (StatusCode::CONFLICT, "NOT_READY", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "MODEL_NOT_LOADED", msg)
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Model(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "MODEL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %message, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
