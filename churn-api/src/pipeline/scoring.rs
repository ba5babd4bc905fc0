//! Scorer adapter: `predict_proba(transform(features))`

use std::sync::Arc;

use churn_common::model::{FeatureMatrix, ModelError, Scorer, Transform};

/// Output of one scoring pass
#[derive(Debug, Clone)]
pub struct Scored {
    pub scaled: FeatureMatrix,
    pub probabilities: Vec<f64>,
}

/// Uniform scoring contract over the opaque scaler and scorer
#[derive(Clone)]
pub struct ScorerAdapter {
    transform: Arc<dyn Transform>,
    scorer: Arc<dyn Scorer>,
}

impl ScorerAdapter {
    pub fn new(transform: Arc<dyn Transform>, scorer: Arc<dyn Scorer>) -> Self {
        Self { transform, scorer }
    }

    /// Scale and score every row of `features`
    ///
    /// The collaborators are checked for shape and range so a misbehaving
    /// scorer surfaces as an error instead of a bogus decision.
    pub fn score(&self, features: &FeatureMatrix) -> Result<Scored, ModelError> {
        let scaled = self.transform.transform(features)?;
        if scaled.rows() != features.rows() || scaled.columns() != features.columns() {
            return Err(ModelError::Scoring(format!(
                "transform returned {}x{} for {}x{} input",
                scaled.rows(),
                scaled.columns(),
                features.rows(),
                features.columns()
            )));
        }

        let probabilities = self.scorer.predict_proba(&scaled)?;
        if probabilities.len() != features.rows() {
            return Err(ModelError::Scoring(format!(
                "scorer returned {} probabilities for {} rows",
                probabilities.len(),
                features.rows()
            )));
        }
        if let Some(bad) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(ModelError::Scoring(format!(
                "scorer returned probability {} outside [0, 1]",
                bad
            )));
        }

        Ok(Scored {
            scaled,
            probabilities,
        })
    }
}
