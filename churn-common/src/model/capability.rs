//! Scorer, scaler and importance capabilities
//!
//! Shared read-only across workers, hence `Send + Sync`.

use super::{FeatureMatrix, ModelError};

/// Feature scaling fitted at training time
pub trait Transform: Send + Sync {
    fn transform(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ModelError>;
}

/// Churn probability for each row of an already-scaled matrix
pub trait Scorer: Send + Sync {
    fn predict_proba(&self, scaled: &FeatureMatrix) -> Result<Vec<f64>, ModelError>;
}

/// One non-negative weight per training column
pub trait FeatureImportance: Send + Sync {
    fn feature_importances(&self) -> &[f64];
}

/// `(x - mean) / scale`, column-wise
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelError> {
        if mean.len() != scale.len() {
            return Err(ModelError::Invalid(format!(
                "scaler mean has {} entries but scale has {}",
                mean.len(),
                scale.len()
            )));
        }
        if let Some(pos) = mean.iter().position(|m| !m.is_finite()) {
            return Err(ModelError::Invalid(format!("scaler mean[{}] is not finite", pos)));
        }
        if let Some(pos) = scale.iter().position(|s| !s.is_finite() || *s == 0.0) {
            return Err(ModelError::Invalid(format!(
                "scaler scale[{}] must be finite and non-zero",
                pos
            )));
        }
        Ok(Self { mean, scale })
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }
}

impl Transform for StandardScaler {
    fn transform(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ModelError> {
        if features.columns() != self.dimension() {
            return Err(ModelError::DimensionMismatch {
                expected: self.dimension(),
                actual: features.columns(),
            });
        }

        let mut scaled = FeatureMatrix::with_capacity(features.rows(), features.columns());
        let mut buf = vec![0.0; features.columns()];
        for row in features.iter_rows() {
            for (j, x) in row.iter().enumerate() {
                buf[j] = (x - self.mean[j]) / self.scale[j];
            }
            scaled.push_row(&buf)?;
        }
        Ok(scaled)
    }
}

/// Logistic regression: `sigmoid(w . x + b)`
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticScorer {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LogisticScorer {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Result<Self, ModelError> {
        if let Some(pos) = coefficients.iter().position(|c| !c.is_finite()) {
            return Err(ModelError::Invalid(format!("coefficient[{}] is not finite", pos)));
        }
        if !intercept.is_finite() {
            return Err(ModelError::Invalid("intercept is not finite".to_string()));
        }
        Ok(Self {
            coefficients,
            intercept,
        })
    }
}

impl Scorer for LogisticScorer {
    fn predict_proba(&self, scaled: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        if scaled.columns() != self.coefficients.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.coefficients.len(),
                actual: scaled.columns(),
            });
        }

        Ok(scaled
            .iter_rows()
            .map(|row| {
                let z: f64 = row
                    .iter()
                    .zip(&self.coefficients)
                    .map(|(x, w)| x * w)
                    .sum::<f64>()
                    + self.intercept;
                1.0 / (1.0 + (-z).exp())
            })
            .collect())
    }
}

/// Fixed importance vector shipped with the artifact
#[derive(Debug, Clone, PartialEq)]
pub struct StaticImportances(Vec<f64>);

impl StaticImportances {
    pub fn new(weights: Vec<f64>) -> Result<Self, ModelError> {
        if let Some(pos) = weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
            return Err(ModelError::Invalid(format!(
                "feature importance[{}] must be finite and non-negative",
                pos
            )));
        }
        Ok(Self(weights))
    }

    /// Magnitudes of linear coefficients, for artifacts without explicit importances
    pub fn from_coefficients(coefficients: &[f64]) -> Self {
        Self(coefficients.iter().map(|c| c.abs()).collect())
    }
}

impl FeatureImportance for StaticImportances {
    fn feature_importances(&self) -> &[f64] {
        &self.0
    }
}
