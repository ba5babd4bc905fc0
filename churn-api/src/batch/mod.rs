//! Batch scoring jobs
//!
//! [`JobManager`] owns the job lifecycle: it streams an upload to disk,
//! validates the header, persists a RUNNING job and hands execution to a
//! background task. [`BatchExecutor`] does the chunked scoring itself.

pub mod executor;
pub mod manager;

pub use executor::{BatchExecutor, OUTPUT_COLUMNS};
pub use manager::{BatchSettings, JobManager, JobPaths, ResultLookup};

use churn_common::model::ModelError;
use churn_common::schema::ValidationError;
use thiserror::Error;

/// Failure while executing a batch job (job becomes FAILED)
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    Input(#[from] ValidationError),

    #[error("Invalid row at line {line}: {source}")]
    InvalidRow {
        line: u64,
        #[source]
        source: ValidationError,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Job store error: {0}")]
    Store(#[from] churn_common::Error),

    #[error("Batch worker failed: {0}")]
    Worker(String),
}

/// Failure while accepting an upload (no job is created)
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("Uploaded file is empty")]
    Empty,

    #[error("Invalid upload: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Failed to read upload body: {0}")]
    Stream(String),

    #[error("Failed to parse CSV header: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job store error: {0}")]
    Store(#[from] churn_common::Error),

    #[error("Model is not loaded")]
    ModelUnavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}
