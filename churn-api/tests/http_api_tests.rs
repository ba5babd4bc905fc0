//! HTTP API Integration Tests
//!
//! Router-level tests through `tower::ServiceExt::oneshot`: health, single
//! record scoring, batch submission, status and download.

mod helpers;

use axum::http::StatusCode;
use helpers::*;
use serde_json::json;
use tempfile::TempDir;

#[tokio::test]
async fn test_health_reports_loaded_model() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path(), Some(reference_pipeline())).await;

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "UP");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["model_version"], "1.0.0");
    assert_eq!(body["module"], "churn-api");
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_root_lists_service() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path(), Some(reference_pipeline())).await;

    let body = body_json(get(&app, "/").await).await;
    assert_eq!(body["service"], "churn-api");
    assert_eq!(body["model_loaded"], true);
}

#[tokio::test]
async fn test_without_model_scoring_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path(), None).await;

    let body = body_json(get(&app, "/health").await).await;
    assert_eq!(body["status"], "UP");
    assert_eq!(body["model_loaded"], false);

    let response = post_json(&app, "/predict", &churn_payload()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "MODEL_NOT_LOADED");

    let response = post_csv(&app, "/batch", &churn_csv()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_predict_high_risk_record() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path(), Some(reference_pipeline())).await;

    let response = post_json(&app, "/predict", &churn_payload()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["label"], "will churn");
    assert_eq!(body["risk_tier"], "HIGH");
    assert_eq!(body["explanation"], json!(["Age", "Germany", "Male"]));
    assert_eq!(body["credit_score_band"], "Low");
    assert!(body["recommendation"]
        .as_str()
        .unwrap()
        .starts_with("Immediate action"));

    let probability = body["probability"].as_f64().unwrap();
    assert!((0.5..=1.0).contains(&probability));
    assert_eq!((probability * 10_000.0).round() / 10_000.0, probability);
}

#[tokio::test]
async fn test_predict_low_risk_record() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path(), Some(reference_pipeline())).await;

    let mut payload = churn_payload();
    payload["Balance"] = json!(0);
    payload["CreditScore"] = json!(900);

    let body = body_json(post_json(&app, "/predict", &payload).await).await;
    assert_eq!(body["label"], "will stay");
    assert_eq!(body["risk_tier"], "LOW");
    assert_eq!(body["explanation"], json!([]));
    assert_eq!(body["credit_score_band"], "Excellent");
}

#[tokio::test]
async fn test_predict_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path(), Some(reference_pipeline())).await;

    let first = body_bytes(post_json(&app, "/predict", &churn_payload()).await).await;
    let second = body_bytes(post_json(&app, "/predict", &churn_payload()).await).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_predict_rejects_invalid_records() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path(), Some(reference_pipeline())).await;

    let mut out_of_range = churn_payload();
    out_of_range["Age"] = json!(150);
    let response = post_json(&app, "/predict", &out_of_range).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_RECORD");

    let mut unknown_category = churn_payload();
    unknown_category["Geography"] = json!("Italy");
    let response = post_json(&app, "/predict", &unknown_category).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let mut missing = churn_payload();
    missing.as_object_mut().unwrap().remove("Tenure");
    let response = post_json(&app, "/predict", &missing).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_batch_round_trip() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path(), Some(reference_pipeline())).await;

    let response = post_csv(&app, "/batch?filename=customers.csv", &churn_csv()).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "RUNNING");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let status = wait_for_job(&app, &job_id).await;
    assert_eq!(status["status"], "DONE");
    assert_eq!(status["summary"]["rows_scored"], 3);
    assert!(status.get("output_location").is_none());

    let response = get(&app, &format!("/batch/{}/download", job_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .contains("text/csv"));

    let csv = String::from_utf8(body_bytes(response).await).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        format!("{},probability,risk_tier,label,explanation", CHURN_HEADER)
    );
    assert!(lines[1].ends_with(",HIGH,will churn,Age;Germany;Male"));
    assert!(lines[2].ends_with(",LOW,will stay,"));
    assert!(lines[3].ends_with(",HIGH,will churn,Age;Female;Spain"));
}

#[tokio::test]
async fn test_batch_input_errors_create_no_job() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path(), Some(reference_pipeline())).await;

    // wrong file name
    let response = post_csv(&app, "/batch?filename=customers.xlsx", &churn_csv()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // missing required column
    let response = post_csv(&app, "/batch", "CreditScore,Age\n600,40\n").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Geography"));

    // empty body
    let response = post_csv(&app, "/batch", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // not CSV
    let response = post_json(&app, "/batch", &churn_payload()).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let uploads = std::fs::read_dir(dir.path().join("uploads")).unwrap().count();
    assert_eq!(uploads, 0);
}

#[tokio::test]
async fn test_failed_job_reports_detail_and_is_not_downloadable() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path(), Some(reference_pipeline())).await;

    let csv = format!("{}4,350,Germany,Male,55,2,-5,40000\n", churn_csv());
    let body = body_json(post_csv(&app, "/batch", &csv).await).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let status = wait_for_job(&app, &job_id).await;
    assert_eq!(status["status"], "FAILED");
    assert!(status["error_detail"].as_str().unwrap().contains("Balance"));

    let response = get(&app, &format!("/batch/{}/download", job_id)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_READY");
}

#[tokio::test]
async fn test_unknown_job_id() {
    let dir = TempDir::new().unwrap();
    let app = test_app(dir.path(), Some(reference_pipeline())).await;
    let job_id = uuid::Uuid::new_v4();

    let response = get(&app, &format!("/batch/{}/status", job_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "UNKNOWN");

    let response = get(&app, &format!("/batch/{}/download", job_id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app, "/batch/not-a-uuid/status").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
