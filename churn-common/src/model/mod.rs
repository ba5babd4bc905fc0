//! Trained model seams
//!
//! The scorer, the scaler and the feature importances are opaque
//! capabilities. Everything downstream talks to them through the three
//! traits in [`capability`]; [`artifact`] loads the shipped JSON
//! implementation of all three.

pub mod artifact;
pub mod capability;
pub mod matrix;

pub use artifact::{ModelArtifact, ModelBundle, Thresholds};
pub use capability::{
    FeatureImportance, LogisticScorer, Scorer, StandardScaler, StaticImportances, Transform,
};
pub use matrix::FeatureMatrix;

use thiserror::Error;

/// Model loading and scoring failures
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read model artifact {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid model artifact: {0}")]
    Invalid(String),

    #[error("Feature dimension mismatch: expected {expected} columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Scoring failed: {0}")]
    Scoring(String),
}
