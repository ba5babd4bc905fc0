//! Durable batch job status store
//!
//! Each job is one row keyed by id. The only writes after creation are the
//! terminal transitions, and each is a single conditional `UPDATE` guarded by
//! `status = 'RUNNING'`: whichever transition lands first wins and nothing can
//! move a job out of DONE or FAILED.

use chrono::{DateTime, Utc};
use churn_common::db::retry_on_lock;
use churn_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::models::{Job, JobStatus, JobSummary};

/// Detail recorded for jobs whose worker died with a previous process
pub const INTERRUPTED_DETAIL: &str = "interrupted by restart";

#[derive(Debug, Clone)]
pub struct JobStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl JobStore {
    /// Wrap `pool`, creating the jobs table if needed
    pub async fn init(pool: SqlitePool, max_lock_wait_ms: u64) -> Result<Self> {
        super::init_tables(&pool).await?;
        Ok(Self {
            pool,
            max_lock_wait_ms,
        })
    }

    /// Persist a new RUNNING job
    pub async fn create_running(&self, job_id: Uuid) -> Result<()> {
        let id = job_id.to_string();
        let created_at = Utc::now().to_rfc3339();

        retry_on_lock("create_job", self.max_lock_wait_ms, || async {
            sqlx::query(
                "INSERT INTO jobs (job_id, status, created_at) VALUES (?, 'RUNNING', ?)",
            )
            .bind(&id)
            .bind(&created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    /// RUNNING → DONE. Returns false if the job was not RUNNING.
    pub async fn mark_done(
        &self,
        job_id: Uuid,
        output_location: &str,
        summary: &JobSummary,
    ) -> Result<bool> {
        let id = job_id.to_string();
        let finished_at = Utc::now().to_rfc3339();
        let rows_scored = summary.rows_scored as i64;
        let rows_skipped = summary.rows_skipped as i64;
        let chunks = summary.chunks as i64;

        let affected = retry_on_lock("mark_job_done", self.max_lock_wait_ms, || async {
            let result = sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'DONE',
                    output_location = ?,
                    rows_scored = ?,
                    rows_skipped = ?,
                    chunks = ?,
                    finished_at = ?
                WHERE job_id = ? AND status = 'RUNNING'
                "#,
            )
            .bind(output_location)
            .bind(rows_scored)
            .bind(rows_skipped)
            .bind(chunks)
            .bind(&finished_at)
            .bind(&id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        Ok(affected == 1)
    }

    /// RUNNING → FAILED. Returns false if the job was not RUNNING.
    pub async fn mark_failed(&self, job_id: Uuid, error_detail: &str) -> Result<bool> {
        let id = job_id.to_string();
        let finished_at = Utc::now().to_rfc3339();

        let affected = retry_on_lock("mark_job_failed", self.max_lock_wait_ms, || async {
            let result = sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'FAILED', error_detail = ?, finished_at = ?
                WHERE job_id = ? AND status = 'RUNNING'
                "#,
            )
            .bind(error_detail)
            .bind(&finished_at)
            .bind(&id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        Ok(affected == 1)
    }

    pub async fn load(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(
            r#"
            SELECT job_id, status, error_detail, output_location,
                   rows_scored, rows_skipped, chunks, created_at, finished_at
            FROM jobs
            WHERE job_id = ?
            "#,
        )
        .bind(job_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| job_from_row(job_id, &row)).transpose()
    }

    /// Current state, or the UNKNOWN sentinel for ids with no record
    pub async fn status(&self, job_id: Uuid) -> Result<Job> {
        Ok(self
            .load(job_id)
            .await?
            .unwrap_or_else(|| Job::unknown(job_id)))
    }

    /// Fail every job still RUNNING
    ///
    /// Called once at startup, before any new job is accepted: a RUNNING row
    /// at that point belongs to a worker that no longer exists.
    pub async fn fail_interrupted(&self) -> Result<Vec<Uuid>> {
        let finished_at = Utc::now().to_rfc3339();

        let ids = retry_on_lock("fail_interrupted_jobs", self.max_lock_wait_ms, || async {
            let ids: Vec<String> = sqlx::query_scalar(
                r#"
                UPDATE jobs
                SET status = 'FAILED', error_detail = ?, finished_at = ?
                WHERE status = 'RUNNING'
                RETURNING job_id
                "#,
            )
            .bind(INTERRUPTED_DETAIL)
            .bind(&finished_at)
            .fetch_all(&self.pool)
            .await?;
            Ok(ids)
        })
        .await?;

        ids.iter()
            .map(|id| {
                Uuid::parse_str(id)
                    .map_err(|e| Error::Internal(format!("Invalid job id '{}' in store: {}", id, e)))
            })
            .collect()
    }
}

fn job_from_row(job_id: Uuid, row: &SqliteRow) -> Result<Job> {
    let status: String = row.get("status");
    let status = JobStatus::from_db_str(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown job status in store: {}", status)))?;

    let created_at: String = row.get("created_at");
    let created_at = parse_timestamp(&created_at, "created_at")?;

    let finished_at: Option<String> = row.get("finished_at");
    let finished_at = finished_at
        .map(|s| parse_timestamp(&s, "finished_at"))
        .transpose()?;

    let rows_scored: Option<i64> = row.get("rows_scored");
    let rows_skipped: Option<i64> = row.get("rows_skipped");
    let chunks: Option<i64> = row.get("chunks");
    let summary = match (rows_scored, rows_skipped, chunks) {
        (Some(rows_scored), Some(rows_skipped), Some(chunks)) => Some(JobSummary {
            rows_scored: rows_scored.max(0) as u64,
            rows_skipped: rows_skipped.max(0) as u64,
            chunks: chunks.max(0) as u64,
        }),
        _ => None,
    };

    Ok(Job {
        job_id,
        status,
        error_detail: row.get("error_detail"),
        output_location: row.get("output_location"),
        summary,
        created_at: Some(created_at),
        finished_at,
    })
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}
