//! Configuration loading and root folder resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! Command-line and environment tiers are merged by the service's `clap`
//! parser (`#[arg(env = ...)]`); this module covers the TOML and default tiers.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-user and system config directory
const CONFIG_DIR_NAME: &str = "churn";

/// How a batch job treats a row that fails domain validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// Any invalid row fails the whole job
    #[default]
    RejectJob,
    /// Invalid rows are left out of the output; valid rows are still scored
    SkipRow,
}

impl std::str::FromStr for RowPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reject_job" => Ok(RowPolicy::RejectJob),
            "skip_row" => Ok(RowPolicy::SkipRow),
            other => Err(Error::Config(format!(
                "Unknown row policy '{}' (expected reject_job or skip_row)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for RowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowPolicy::RejectJob => write!(f, "reject_job"),
            RowPolicy::SkipRow => write!(f, "skip_row"),
        }
    }
}

/// Settings read from `config.toml`
///
/// All fields are optional; anything left unset falls through to the
/// compiled default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind: Option<String>,
    pub model_path: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub row_policy: Option<RowPolicy>,
    pub top_n: Option<usize>,
    pub max_upload_bytes: Option<u64>,
    pub max_lock_wait_ms: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[logging]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset (e.g. "info")
    pub level: Option<String>,
}

/// Load the TOML config
///
/// An explicit path must exist and parse. Without one, the platform config
/// locations are probed and a missing file yields the default (empty) config.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match find_config_file() {
            Some(path) => path,
            None => return Ok(TomlConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    tracing::debug!(path = %path.display(), "Loaded TOML config");
    Ok(config)
}

/// Root folder resolution: CLI/ENV value, then TOML, then the OS default
pub fn resolve_root_folder(cli_or_env: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_or_env {
        return path.to_path_buf();
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Locate the config file for the platform
///
/// Linux tries `~/.config/churn/config.toml` first, then `/etc/churn/config.toml`.
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(CONFIG_DIR_NAME).join("config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/churn (or /var/lib/churn for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join(CONFIG_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("/var/lib/churn"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join(CONFIG_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/churn"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join(CONFIG_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\churn"))
    } else {
        PathBuf::from("./churn_data")
    }
}
