//! Database initialization
//!
//! Opens (or creates) the SQLite database in the root folder. Pragmas go
//! through the connect options so every pooled connection gets them. Table
//! creation is left to each service.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// SQLite busy timeout; lock waits beyond this surface as errors for
/// `retry_on_lock` to handle
const BUSY_TIMEOUT_MS: u64 = 250;

/// Initialize database connection pool, creating the file if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        // WAL allows concurrent status readers while a job worker writes
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    info!("Database busy timeout set to {} ms", BUSY_TIMEOUT_MS);

    Ok(pool)
}

/// Single-connection in-memory database for tests and ephemeral runs
///
/// Pinned to one connection: every `:memory:` connection is a separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}
