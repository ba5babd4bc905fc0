//! Data models for the churn scoring service
//!
//! - Batch job lifecycle (RUNNING → DONE | FAILED)

pub mod job;

pub use job::{Job, JobStatus, JobSummary};
