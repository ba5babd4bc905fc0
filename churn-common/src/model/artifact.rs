//! Model artifact loading
//!
//! The artifact is a single JSON document carrying the training column list,
//! the fitted scaler, the logistic coefficients, optional feature
//! importances, the decision thresholds and (optionally) the domain schema.
//! Everything is validated here, at load time, so a bad artifact never
//! reaches a job.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    FeatureImportance, LogisticScorer, ModelError, Scorer, StandardScaler, StaticImportances,
    Transform,
};
use crate::schema::DomainSchema;

/// Decision thresholds; `medium` enables the three-tier mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub high: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<f64>,
}

impl Thresholds {
    pub fn binary(high: f64) -> Self {
        Self { high, medium: None }
    }

    pub fn tiered(medium: f64, high: f64) -> Self {
        Self {
            high,
            medium: Some(medium),
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !(0.0..=1.0).contains(&self.high) {
            return Err(ModelError::Invalid(format!(
                "high threshold {} is outside [0, 1]",
                self.high
            )));
        }
        if let Some(medium) = self.medium {
            if !(0.0..=1.0).contains(&medium) {
                return Err(ModelError::Invalid(format!(
                    "medium threshold {} is outside [0, 1]",
                    medium
                )));
            }
            if medium >= self.high {
                return Err(ModelError::Invalid(format!(
                    "medium threshold {} must be below high threshold {}",
                    medium, self.high
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticParams {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// On-disk artifact layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(default = "default_version")]
    pub version: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub schema: DomainSchema,
    pub scaler: ScalerParams,
    pub model: LogisticParams,
    #[serde(default)]
    pub feature_importances: Option<Vec<f64>>,
    pub thresholds: Thresholds,
}

fn default_version() -> String {
    "unversioned".to_string()
}

impl ModelArtifact {
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Validate and instantiate the three capabilities
    pub fn into_bundle(self) -> Result<ModelBundle, ModelError> {
        let width = self.columns.len();
        check_width("scaler mean", self.scaler.mean.len(), width)?;
        check_width("scaler scale", self.scaler.scale.len(), width)?;
        check_width("model coefficients", self.model.coefficients.len(), width)?;

        let scaler = StandardScaler::new(self.scaler.mean, self.scaler.scale)?;
        let importances = match self.feature_importances {
            Some(weights) => StaticImportances::new(weights)?,
            None => StaticImportances::from_coefficients(&self.model.coefficients),
        };
        let scorer = LogisticScorer::new(self.model.coefficients, self.model.intercept)?;

        ModelBundle::new(
            self.version,
            self.columns,
            self.schema,
            Arc::new(scaler),
            Arc::new(scorer),
            Arc::new(importances),
            self.thresholds,
        )
    }
}

fn check_width(what: &str, actual: usize, expected: usize) -> Result<(), ModelError> {
    if actual != expected {
        return Err(ModelError::Invalid(format!(
            "{} has {} entries but there are {} training columns",
            what, actual, expected
        )));
    }
    Ok(())
}

/// Loaded, validated model: read-only after startup
#[derive(Clone)]
pub struct ModelBundle {
    pub version: String,
    pub columns: Vec<String>,
    pub schema: DomainSchema,
    pub transform: Arc<dyn Transform>,
    pub scorer: Arc<dyn Scorer>,
    pub importances: Arc<dyn FeatureImportance>,
    pub thresholds: Thresholds,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("version", &self.version)
            .field("columns", &self.columns)
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

impl ModelBundle {
    /// Assemble a bundle from arbitrary capability implementations
    pub fn new(
        version: String,
        columns: Vec<String>,
        schema: DomainSchema,
        transform: Arc<dyn Transform>,
        scorer: Arc<dyn Scorer>,
        importances: Arc<dyn FeatureImportance>,
        thresholds: Thresholds,
    ) -> Result<Self, ModelError> {
        if columns.is_empty() {
            return Err(ModelError::Invalid("no training columns".to_string()));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(ModelError::Invalid(format!("duplicate training column '{}'", column)));
            }
        }
        check_width(
            "feature importances",
            importances.feature_importances().len(),
            columns.len(),
        )?;
        thresholds.validate()?;

        Ok(Self {
            version,
            columns,
            schema,
            transform,
            scorer,
            importances,
            thresholds,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        ModelArtifact::load(path)?.into_bundle()
    }
}
