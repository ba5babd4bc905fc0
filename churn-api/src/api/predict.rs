//! Single-record scoring
//!
//! One record through the same pipeline the batch executor uses.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use churn_common::schema::FieldValue;
use serde::Serialize;

use crate::pipeline::{credit_score_band, CreditScoreBand, Decision};
use crate::{ApiError, ApiResult, AppState};

const CREDIT_SCORE_FIELD: &str = "CreditScore";

/// POST /predict response
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    #[serde(flatten)]
    pub decision: Decision,
    pub recommendation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_score_band: Option<CreditScoreBand>,
    pub model_version: String,
}

/// POST /predict
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<Json<PredictResponse>> {
    let pipeline = state.require_pipeline()?;
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let schema = pipeline.schema();
    let record = schema.record_from_json(&payload)?;
    let decision = pipeline.score_one(&record)?;

    let credit_score_band = schema
        .field_index(CREDIT_SCORE_FIELD)
        .and_then(|idx| record.value(idx))
        .and_then(|value| match value {
            FieldValue::Number(score) => Some(credit_score_band(*score)),
            FieldValue::Category(_) => None,
        });

    tracing::debug!(
        probability = decision.probability,
        risk_tier = %decision.risk_tier,
        "Record scored"
    );

    Ok(Json(PredictResponse {
        recommendation: decision.risk_tier.recommendation(),
        credit_score_band,
        model_version: pipeline.model_version().to_string(),
        decision,
    }))
}

/// Build single-record scoring routes
pub fn predict_routes() -> Router<AppState> {
    Router::new().route("/predict", post(predict))
}
