//! churn-api - churn scoring service
//!
//! Scores customer records for churn risk, one at a time over
//! `POST /predict` or as CSV batch jobs over `POST /batch`. Batch job status
//! lives in `<root>/churn.db` and survives restarts.

use std::sync::Arc;

use anyhow::{Context, Result};
use churn_api::batch::{JobManager, JobPaths};
use churn_api::config::{Cli, ServiceConfig};
use churn_api::db::JobStore;
use churn_api::pipeline::Pipeline;
use churn_api::{build_router, AppState};
use churn_common::config::load_toml_config;
use churn_common::db::init_database;
use churn_common::model::ModelBundle;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let toml_config = load_toml_config(cli.config.as_deref())?;
    let config = ServiceConfig::resolve(&cli, &toml_config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting churn-api v{}", env!("CARGO_PKG_VERSION"));
    info!("Root folder: {}", config.root_folder.display());
    info!(
        chunk_size = config.batch.chunk_size,
        row_policy = %config.batch.row_policy,
        max_upload_bytes = config.batch.max_upload_bytes,
        "Batch settings"
    );

    tokio::fs::create_dir_all(&config.root_folder)
        .await
        .with_context(|| format!("Failed to create root folder {}", config.root_folder.display()))?;

    info!("Database: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open database")?;
    let store = JobStore::init(pool, config.max_lock_wait_ms).await?;

    // Degraded mode: keep serving status and downloads without a model
    let (pipeline, load_error) = match load_pipeline(&config) {
        Ok(pipeline) => {
            info!(
                model_version = pipeline.model_version(),
                path = %config.model_path.display(),
                "Model loaded"
            );
            (Some(Arc::new(pipeline)), None)
        }
        Err(e) => {
            error!(
                path = %config.model_path.display(),
                error = %e,
                "Failed to load model; scoring endpoints will return 503"
            );
            (None, Some(format!("{:#}", e)))
        }
    };

    let jobs = JobManager::new(
        store,
        JobPaths::new(&config.root_folder),
        config.batch,
        pipeline.clone(),
    )
    .await?;

    let recovered = jobs.recover_orphans().await?;
    if recovered > 0 {
        warn!(recovered, "Marked jobs interrupted by the previous run as FAILED");
    }

    let state = AppState::new(pipeline, jobs);
    if let Some(message) = load_error {
        state.record_error(message).await;
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("Listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn load_pipeline(config: &ServiceConfig) -> Result<Pipeline> {
    let bundle = ModelBundle::load(&config.model_path)
        .with_context(|| format!("Failed to load model {}", config.model_path.display()))?;
    let pipeline = Pipeline::new(bundle, config.top_n).context("Model is unusable")?;
    Ok(pipeline)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
