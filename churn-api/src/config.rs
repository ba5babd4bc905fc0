//! Service configuration
//!
//! Command-line arguments and `CHURN_*` environment variables are merged by
//! `clap`; whatever they leave unset falls back to the TOML file and then to
//! compiled defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use churn_common::config::{resolve_root_folder, RowPolicy, TomlConfig};
use churn_common::{Error, Result};
use clap::Parser;

use crate::batch::BatchSettings;

pub const DEFAULT_BIND: &str = "127.0.0.1:5780";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_TOP_N: usize = 3;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 256 * 1024 * 1024;
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Database file name inside the root folder
const DATABASE_FILE: &str = "churn.db";
/// Model artifact file name inside the root folder
const MODEL_FILE: &str = "model.json";

/// Command-line arguments for churn-api
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "churn-api")]
#[command(about = "Churn scoring service: single-record and batch scoring with explanations")]
#[command(version)]
pub struct Cli {
    /// TOML config file (skips the default search locations)
    #[arg(short, long, env = "CHURN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root folder holding the database, uploads and results
    #[arg(short, long, env = "CHURN_ROOT_FOLDER")]
    pub root_folder: Option<PathBuf>,

    /// Listen address
    #[arg(short, long, env = "CHURN_BIND")]
    pub bind: Option<String>,

    /// Model artifact (JSON)
    #[arg(short, long, env = "CHURN_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Rows per batch chunk
    #[arg(long, env = "CHURN_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Invalid batch rows: reject_job or skip_row
    #[arg(long, env = "CHURN_ROW_POLICY")]
    pub row_policy: Option<RowPolicy>,

    /// Explanation entries for HIGH risk decisions (at most 3)
    #[arg(long, env = "CHURN_TOP_N")]
    pub top_n: Option<usize>,

    /// Largest accepted batch upload
    #[arg(long, env = "CHURN_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<u64>,

    /// Longest retry window for a locked database
    #[arg(long, env = "CHURN_MAX_LOCK_WAIT_MS")]
    pub max_lock_wait_ms: Option<u64>,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind: SocketAddr,
    pub model_path: PathBuf,
    pub database_path: PathBuf,
    pub batch: BatchSettings,
    pub top_n: usize,
    pub max_lock_wait_ms: u64,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl ServiceConfig {
    pub fn resolve(cli: &Cli, toml: &TomlConfig) -> Result<Self> {
        let root_folder = resolve_root_folder(cli.root_folder.as_deref(), toml);

        let bind = cli
            .bind
            .clone()
            .or_else(|| toml.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind, e)))?;

        let model_path = cli
            .model_path
            .clone()
            .or_else(|| toml.model_path.clone())
            .unwrap_or_else(|| root_folder.join(MODEL_FILE));

        let chunk_size = cli
            .chunk_size
            .or(toml.chunk_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".to_string()));
        }

        let top_n = cli.top_n.or(toml.top_n).unwrap_or(DEFAULT_TOP_N);
        if top_n == 0 {
            return Err(Error::Config("top_n must be at least 1".to_string()));
        }

        let batch = BatchSettings {
            chunk_size,
            row_policy: cli.row_policy.or(toml.row_policy).unwrap_or_default(),
            max_upload_bytes: cli
                .max_upload_bytes
                .or(toml.max_upload_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };

        Ok(Self {
            database_path: root_folder.join(DATABASE_FILE),
            root_folder,
            bind,
            model_path,
            batch,
            top_n,
            max_lock_wait_ms: cli
                .max_lock_wait_ms
                .or(toml.max_lock_wait_ms)
                .unwrap_or(DEFAULT_MAX_LOCK_WAIT_MS),
            log_level: toml
                .logging
                .level
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}
