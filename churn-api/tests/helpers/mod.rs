//! Test Helper Utilities
//!
//! Shared setup for churn-api integration tests: reference model, on-disk
//! job store in a temp root folder, router and response helpers.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use churn_api::batch::{BatchSettings, JobManager, JobPaths};
use churn_api::db::JobStore;
use churn_api::models::{Job, JobStatus};
use churn_api::pipeline::Pipeline;
use churn_api::{build_router, AppState};
use churn_common::db::init_database;
use churn_common::model::{
    FeatureMatrix, ModelArtifact, ModelBundle, ModelError, Scorer, Thresholds,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const REFERENCE_MODEL: &str = include_str!("../../assets/churn-model.json");

pub const CHURN_HEADER: &str =
    "RowNumber,CreditScore,Geography,Gender,Age,Tenure,Balance,EstimatedSalary";

pub fn reference_bundle() -> ModelBundle {
    ModelArtifact::from_json(REFERENCE_MODEL)
        .unwrap()
        .into_bundle()
        .unwrap()
}

pub fn reference_pipeline() -> Arc<Pipeline> {
    Arc::new(Pipeline::new(reference_bundle(), 3).unwrap())
}

/// Reference model with three-tier thresholds
pub fn tiered_pipeline(medium: f64, high: f64) -> Arc<Pipeline> {
    let mut bundle = reference_bundle();
    bundle.thresholds = Thresholds::tiered(medium, high);
    Arc::new(Pipeline::new(bundle, 3).unwrap())
}

/// Scorer that fails every call
pub struct FailingScorer;

impl Scorer for FailingScorer {
    fn predict_proba(&self, _scaled: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        Err(ModelError::Scoring("scorer backend unavailable".to_string()))
    }
}

/// Reference model whose scorer always fails
pub fn failing_pipeline() -> Arc<Pipeline> {
    let mut bundle = reference_bundle();
    bundle.scorer = Arc::new(FailingScorer);
    Arc::new(Pipeline::new(bundle, 3).unwrap())
}

/// Three valid rows: HIGH, LOW, and a second HIGH-leaning customer
pub fn churn_csv() -> String {
    format!(
        "{}\n1,350,Germany,Male,55,2,150000,40000\n2,900,Germany,Male,55,2,0,40000\n3,480,Spain,Female,66,1,130000,20000\n",
        CHURN_HEADER
    )
}

/// Job store on `<root>/churn.db`; reopening the same root simulates a restart
pub async fn open_store(root: &Path) -> JobStore {
    let pool = init_database(&root.join("churn.db")).await.unwrap();
    JobStore::init(pool, 5000).await.unwrap()
}

pub async fn job_manager(
    root: &Path,
    settings: BatchSettings,
    pipeline: Option<Arc<Pipeline>>,
) -> JobManager {
    let store = open_store(root).await;
    JobManager::new(store, JobPaths::new(root), settings, pipeline)
        .await
        .unwrap()
}

pub async fn test_app(root: &Path, pipeline: Option<Arc<Pipeline>>) -> Router {
    let jobs = job_manager(root, BatchSettings::default(), pipeline.clone()).await;
    build_router(AppState::new(pipeline, jobs))
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, uri: &str, payload: &Value) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_csv(app: &Router, uri: &str, csv: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "text/csv")
                .body(Body::from(csv.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Poll `/batch/:id/status` until the job is DONE or FAILED
pub async fn wait_for_job(app: &Router, job_id: &str) -> Value {
    for _ in 0..500 {
        let status = body_json(get(app, &format!("/batch/{}/status", job_id)).await).await;
        if status["status"] == "DONE" || status["status"] == "FAILED" {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish", job_id);
}

/// Poll the manager until the job is DONE or FAILED
pub async fn wait_for_terminal(manager: &JobManager, job_id: Uuid) -> Job {
    for _ in 0..500 {
        let job = manager.get_status(job_id).await.unwrap();
        if matches!(job.status, JobStatus::Done | JobStatus::Failed) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish", job_id);
}

pub fn churn_payload() -> Value {
    serde_json::json!({
        "CreditScore": 350,
        "Geography": "Germany",
        "Gender": "Male",
        "Age": 55,
        "Tenure": 2,
        "Balance": 150000,
        "EstimatedSalary": 40000
    })
}
