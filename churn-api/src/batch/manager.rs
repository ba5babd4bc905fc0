//! Batch job manager
//!
//! Submission is synchronous up to the point where a RUNNING job is durably
//! stored; scoring then runs on a background task, with the CPU-bound chunk
//! loop on the blocking pool. Status and result lookups are plain store
//! reads and never wait on a running job.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use churn_common::config::RowPolicy;
use churn_common::Result;
use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{BatchError, BatchExecutor, SubmitError};
use crate::db::JobStore;
use crate::models::{Job, JobStatus};
use crate::pipeline::Pipeline;

/// Execution settings fixed for the life of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub chunk_size: usize,
    pub row_policy: RowPolicy,
    pub max_upload_bytes: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            row_policy: RowPolicy::default(),
            max_upload_bytes: 256 * 1024 * 1024,
        }
    }
}

/// On-disk layout of job artifacts under the root folder
///
/// ```text
/// <root>/uploads/<job_id>.csv
/// <root>/results/<job_id>.partial.csv
/// <root>/results/<job_id>_result.csv
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    uploads: PathBuf,
    results: PathBuf,
}

impl JobPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            uploads: root.join("uploads"),
            results: root.join("results"),
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.uploads).await?;
        tokio::fs::create_dir_all(&self.results).await?;
        Ok(())
    }

    pub fn upload(&self, job_id: Uuid) -> PathBuf {
        self.uploads.join(format!("{}.csv", job_id))
    }

    pub fn partial(&self, job_id: Uuid) -> PathBuf {
        self.results.join(format!("{}.partial.csv", job_id))
    }

    pub fn result(&self, job_id: Uuid) -> PathBuf {
        self.results.join(format!("{}_result.csv", job_id))
    }
}

/// Outcome of a result lookup
#[derive(Debug, Clone, PartialEq)]
pub enum ResultLookup {
    /// DONE; the artifact is complete at this path
    Ready(PathBuf),
    /// Stored but RUNNING or FAILED
    NotReady(Job),
    /// No stored record
    NotFound,
}

#[derive(Debug, Clone)]
pub struct JobManager {
    store: JobStore,
    paths: JobPaths,
    settings: BatchSettings,
    pipeline: Option<Arc<Pipeline>>,
}

impl JobManager {
    /// `pipeline` is `None` when the model failed to load; submissions are
    /// then refused but status and downloads of earlier jobs still work.
    pub async fn new(
        store: JobStore,
        paths: JobPaths,
        settings: BatchSettings,
        pipeline: Option<Arc<Pipeline>>,
    ) -> Result<Self> {
        paths.ensure_dirs().await?;
        Ok(Self {
            store,
            paths,
            settings,
            pipeline,
        })
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    pub fn paths(&self) -> &JobPaths {
        &self.paths
    }

    /// Accept an upload and schedule it
    ///
    /// Returns once the job is stored RUNNING. Oversize, empty or
    /// header-invalid uploads fail here and no job is created.
    pub async fn submit<S, B, E>(&self, body: S) -> std::result::Result<Uuid, SubmitError>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let pipeline = self.pipeline.clone().ok_or(SubmitError::ModelUnavailable)?;
        let job_id = Uuid::new_v4();
        let upload = self.paths.upload(job_id);

        let bytes = match self.save_upload(&upload, body).await {
            Ok(0) => {
                remove_quietly(&upload).await;
                return Err(SubmitError::Empty);
            }
            Ok(bytes) => bytes,
            Err(e) => {
                remove_quietly(&upload).await;
                return Err(e);
            }
        };

        let header_check = {
            let upload = upload.clone();
            let pipeline = Arc::clone(&pipeline);
            tokio::task::spawn_blocking(move || validate_header(&upload, &pipeline)).await
        };
        let header_check = match header_check {
            Ok(result) => result,
            Err(e) => Err(SubmitError::Internal(format!("Header check task failed: {}", e))),
        };
        if let Err(e) = header_check {
            remove_quietly(&upload).await;
            return Err(e);
        }

        if let Err(e) = self.store.create_running(job_id).await {
            remove_quietly(&upload).await;
            return Err(e.into());
        }

        info!(job_id = %job_id, bytes, "Batch job accepted");

        let manager = self.clone();
        tokio::spawn(async move {
            manager.execute(job_id, pipeline).await;
        });

        Ok(job_id)
    }

    pub async fn get_status(&self, job_id: Uuid) -> Result<Job> {
        self.store.status(job_id).await
    }

    pub async fn get_result(&self, job_id: Uuid) -> Result<ResultLookup> {
        let job = self.store.status(job_id).await?;
        Ok(match job.status {
            JobStatus::Unknown => ResultLookup::NotFound,
            JobStatus::Done => match job.output_location.as_deref() {
                Some(location) => ResultLookup::Ready(PathBuf::from(location)),
                None => {
                    return Err(churn_common::Error::Internal(format!(
                        "Job {} is DONE without an output location",
                        job_id
                    )))
                }
            },
            JobStatus::Running | JobStatus::Failed => ResultLookup::NotReady(job),
        })
    }

    /// Fail jobs orphaned by a previous process and drop their files
    pub async fn recover_orphans(&self) -> Result<usize> {
        let orphans = self.store.fail_interrupted().await?;
        for job_id in &orphans {
            warn!(job_id = %job_id, "Job interrupted by restart marked FAILED");
            remove_quietly(&self.paths.upload(*job_id)).await;
            remove_quietly(&self.paths.partial(*job_id)).await;
            // renamed before the previous run could record DONE
            remove_quietly(&self.paths.result(*job_id)).await;
        }
        Ok(orphans.len())
    }

    async fn save_upload<S, B, E>(&self, path: &Path, body: S) -> std::result::Result<u64, SubmitError>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let limit = self.settings.max_upload_bytes;
        let mut file = tokio::fs::File::create(path).await?;
        let mut written: u64 = 0;

        futures::pin_mut!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| SubmitError::Stream(e.to_string()))?;
            let bytes = chunk.as_ref();
            written += bytes.len() as u64;
            if written > limit {
                return Err(SubmitError::TooLarge { limit });
            }
            file.write_all(bytes).await?;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }

    async fn execute(self, job_id: Uuid, pipeline: Arc<Pipeline>) {
        info!(job_id = %job_id, "Batch job started");

        let upload = self.paths.upload(job_id);
        let partial = self.paths.partial(job_id);
        let result = self.paths.result(job_id);

        let executor = BatchExecutor::new(
            pipeline,
            self.settings.chunk_size,
            self.settings.row_policy,
        );
        let outcome = {
            let (upload, partial, result) = (upload.clone(), partial.clone(), result.clone());
            tokio::task::spawn_blocking(move || executor.run_to_file(&upload, &partial, &result))
                .await
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => Err(BatchError::Worker(e.to_string())),
        };
        remove_quietly(&upload).await;

        match outcome {
            Ok(summary) => {
                let location = result.to_string_lossy();
                match self.store.mark_done(job_id, &location, &summary).await {
                    Ok(true) => info!(
                        job_id = %job_id,
                        rows_scored = summary.rows_scored,
                        rows_skipped = summary.rows_skipped,
                        chunks = summary.chunks,
                        "Batch job DONE"
                    ),
                    Ok(false) => {
                        warn!(job_id = %job_id, "Job was no longer RUNNING; result discarded");
                        remove_quietly(&result).await;
                    }
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "Failed to record DONE");
                        remove_quietly(&result).await;
                        self.fail(job_id, &format!("Failed to record completion: {}", e))
                            .await;
                    }
                }
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Batch job failed");
                remove_quietly(&partial).await;
                self.fail(job_id, &e.to_string()).await;
            }
        }
    }

    async fn fail(&self, job_id: Uuid, detail: &str) {
        match self.store.mark_failed(job_id, detail).await {
            Ok(true) => info!(job_id = %job_id, "Batch job FAILED"),
            Ok(false) => warn!(job_id = %job_id, "Job was no longer RUNNING; failure not recorded"),
            // left RUNNING; recover_orphans fails it on the next start
            Err(e) => error!(job_id = %job_id, error = %e, "Failed to record FAILED"),
        }
    }
}

fn validate_header(path: &Path, pipeline: &Pipeline) -> std::result::Result<(), SubmitError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    pipeline.schema().locate_columns(&header)?;
    Ok(())
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed job file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove job file"),
    }
}
