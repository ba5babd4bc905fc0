//! Scoring pipeline
//!
//! `normalize → transform → predict_proba → classify → explain`, shared by
//! the single-record endpoint and the batch executor. A [`Pipeline`] is
//! immutable once built and is shared between workers behind an `Arc`.

pub mod explain;
pub mod normalizer;
pub mod risk;
pub mod scoring;

pub use explain::ExplanationRanker;
pub use normalizer::{FeatureFieldMap, Normalizer};
pub use risk::{credit_score_band, CreditScoreBand, RiskClassifier, RiskTier};
pub use scoring::{ScorerAdapter, Scored};

use churn_common::model::{ModelBundle, ModelError};
use churn_common::schema::{DomainSchema, Record};
use serde::Serialize;

/// Scoring outcome for one record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub label: String,
    /// Rounded to 4 decimals
    pub probability: f64,
    pub risk_tier: RiskTier,
    /// Empty unless `risk_tier` is HIGH
    pub explanation: Vec<String>,
}

pub struct Pipeline {
    version: String,
    schema: DomainSchema,
    normalizer: Normalizer,
    adapter: ScorerAdapter,
    classifier: RiskClassifier,
    ranker: ExplanationRanker,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("version", &self.version)
            .field("columns", &self.normalizer.width())
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(model: ModelBundle, top_n: usize) -> Result<Self, ModelError> {
        let normalizer = Normalizer::new(&model.schema, &model.columns);
        let ranker = ExplanationRanker::new(
            &model.schema,
            normalizer.field_map(),
            model.importances.feature_importances(),
            top_n,
        )?;
        let classifier = RiskClassifier::new(model.thresholds)?;

        Ok(Self {
            version: model.version,
            schema: model.schema,
            normalizer,
            adapter: ScorerAdapter::new(model.transform, model.scorer),
            classifier,
            ranker,
        })
    }

    pub fn schema(&self) -> &DomainSchema {
        &self.schema
    }

    pub fn model_version(&self) -> &str {
        &self.version
    }

    /// Score a batch of validated records, one decision per record
    ///
    /// Contributions are computed in one pass over the HIGH rows only; the
    /// per-row work left is the top-N ranking.
    pub fn score(&self, records: &[Record]) -> Result<Vec<Decision>, ModelError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let features = self.normalizer.normalize(records);
        let Scored {
            scaled,
            probabilities,
        } = self.adapter.score(&features)?;

        let tiers: Vec<RiskTier> = probabilities
            .iter()
            .map(|p| self.classifier.classify(*p))
            .collect();

        let high_rows: Vec<usize> = tiers
            .iter()
            .enumerate()
            .filter(|(_, tier)| **tier == RiskTier::High)
            .map(|(i, _)| i)
            .collect();
        let contributions = self.ranker.contributions(&scaled, &high_rows);
        let width = self.ranker.field_count();

        let mut explanations: Vec<Vec<String>> = vec![Vec::new(); records.len()];
        for (n, &row) in high_rows.iter().enumerate() {
            let row_contributions = &contributions[n * width..(n + 1) * width];
            explanations[row] = self.ranker.rank(row_contributions, &records[row]);
        }

        Ok(probabilities
            .into_iter()
            .zip(tiers)
            .zip(explanations)
            .map(|((probability, risk_tier), explanation)| Decision {
                label: risk_tier.label().to_string(),
                probability: round4(probability),
                risk_tier,
                explanation,
            })
            .collect())
    }

    pub fn score_one(&self, record: &Record) -> Result<Decision, ModelError> {
        self.score(std::slice::from_ref(record))?
            .pop()
            .ok_or_else(|| ModelError::Scoring("no decision produced".to_string()))
    }
}

fn round4(p: f64) -> f64 {
    (p * 10_000.0).round() / 10_000.0
}
