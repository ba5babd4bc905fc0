//! Database access for churn-api
//!
//! The shared pool comes from `churn_common::db::init_database`; this module
//! owns the service's own tables.

pub mod jobs;

pub use jobs::JobStore;

use churn_common::Result;
use sqlx::SqlitePool;

/// Create churn-api tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            job_id TEXT PRIMARY KEY,
            status TEXT NOT NULL CHECK (status IN ('RUNNING', 'DONE', 'FAILED')),
            error_detail TEXT,
            output_location TEXT,
            rows_scored INTEGER,
            rows_skipped INTEGER,
            chunks INTEGER,
            created_at TEXT NOT NULL,
            finished_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (jobs)");

    Ok(())
}
