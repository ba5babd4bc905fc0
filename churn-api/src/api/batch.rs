//! Batch job endpoints
//!
//! POST /batch streams the CSV body straight to disk; the response comes
//! back as soon as the job is stored RUNNING.

use axum::{
    body::Body,
    extract::{rejection::PathRejection, DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::batch::ResultLookup;
use crate::models::{Job, JobStatus};
use crate::{ApiError, ApiResult, AppState};

/// Content types accepted for uploads
const CSV_CONTENT_TYPES: [&str; 2] = ["text/csv", "application/csv"];

/// POST /batch query parameters
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    /// Original file name, when the client has one; must end in `.csv`
    pub filename: Option<String>,
}

/// POST /batch response
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// POST /batch
pub async fn submit_batch(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    check_content_type(&headers)?;
    if let Some(filename) = &params.filename {
        if !filename.to_ascii_lowercase().ends_with(".csv") {
            return Err(ApiError::BadRequest(format!(
                "File must be CSV: {}",
                filename
            )));
        }
    }
    state.require_pipeline()?;

    let job_id = state.jobs.submit(body.into_data_stream()).await?;

    tracing::info!(
        job_id = %job_id,
        filename = params.filename.as_deref().unwrap_or("-"),
        "Batch submitted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: JobStatus::Running,
        }),
    ))
}

/// GET /batch/:job_id/status
///
/// Always a status value for a well-formed id; UNKNOWN when nothing is stored.
pub async fn get_batch_status(
    State(state): State<AppState>,
    job_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Job>> {
    let Path(job_id) = job_id.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let job = state.jobs.get_status(job_id).await?;
    tracing::debug!(job_id = %job_id, status = %job.status, "Status query");

    Ok(Json(job))
}

/// GET /batch/:job_id/download
pub async fn download_result(
    State(state): State<AppState>,
    job_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Response> {
    let Path(job_id) = job_id.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let path = match state.jobs.get_result(job_id).await? {
        ResultLookup::Ready(path) => path,
        ResultLookup::NotReady(job) => {
            return Err(ApiError::NotReady(format!(
                "Job {} is {}",
                job_id, job.status
            )))
        }
        ResultLookup::NotFound => {
            return Err(ApiError::NotFound(format!("Job not found: {}", job_id)))
        }
    };

    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        ApiError::Internal(format!(
            "Result for job {} missing at {}: {}",
            job_id,
            path.display(),
            e
        ))
    })?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}_result.csv\"", job_id),
            ),
        ],
        body,
    )
        .into_response())
}

fn check_content_type(headers: &HeaderMap) -> ApiResult<()> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError::UnsupportedMediaType("Content-Type must be text/csv".to_string())
        })?;

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if CSV_CONTENT_TYPES.contains(&mime.as_str()) {
        Ok(())
    } else {
        Err(ApiError::UnsupportedMediaType(format!(
            "Content-Type must be text/csv, got {}",
            content_type
        )))
    }
}

/// Build batch job routes
pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/batch",
            // the upload limit is enforced while streaming to disk
            post(submit_batch).layer(DefaultBodyLimit::disable()),
        )
        .route("/batch/:job_id/status", get(get_batch_status))
        .route("/batch/:job_id/download", get(download_result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_csv_content_types_accepted() {
        assert!(check_content_type(&headers("text/csv")).is_ok());
        assert!(check_content_type(&headers("text/csv; charset=utf-8")).is_ok());
        assert!(check_content_type(&headers("Application/CSV")).is_ok());
    }

    #[test]
    fn test_other_content_types_rejected() {
        assert!(matches!(
            check_content_type(&headers("application/json")),
            Err(ApiError::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            check_content_type(&headers("multipart/form-data; boundary=x")),
            Err(ApiError::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            check_content_type(&HeaderMap::new()),
            Err(ApiError::UnsupportedMediaType(_))
        ));
    }
}
