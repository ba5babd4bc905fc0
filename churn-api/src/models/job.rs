//! Batch job state
//!
//! A job is created RUNNING and moves exactly once to DONE or FAILED.
//! UNKNOWN is never stored; it is what a lookup reports for an id the store
//! has no record of.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Accepted and scheduled, not yet terminal
    Running,
    /// Every chunk scored; output artifact is complete
    Done,
    /// Execution stopped on an error; output discarded
    Failed,
    /// No stored record for this id
    Unknown,
}

impl JobStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Failed => "FAILED",
            JobStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(JobStatus::Running),
            "DONE" => Some(JobStatus::Done),
            "FAILED" => Some(JobStatus::Failed),
            "UNKNOWN" => Some(JobStatus::Unknown),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Counters recorded with the DONE transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub rows_scored: u64,
    pub rows_skipped: u64,
    pub chunks: u64,
}

/// Stored batch job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub job_id: Uuid,

    pub status: JobStatus,

    /// Set on FAILED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Result artifact path, set on DONE. Never sent to clients.
    #[serde(skip)]
    pub output_location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<JobSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Sentinel returned for ids with no stored record
    pub fn unknown(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: JobStatus::Unknown,
            error_detail: None,
            output_location: None,
            summary: None,
            created_at: None,
            finished_at: None,
        }
    }
}
