//! Job executor for stitch workers
//!
//! Runs one accepted job to completion: concat list, tool invocation, source
//! cleanup and completion callback. The job's registration is held for the
//! whole run and released when the executor returns, whatever the outcome.

use crate::cleanup::{delete_sources, is_protected_output, remove_list_file, CleanupReport};
use crate::concat::{list_file_path, resolve_tool, run_concat, write_concat_list};
use crate::concat::{ConcatError, ConcatParams};
use crate::concurrency::SpawnPolicy;
use crate::config::Config;
use crate::registry::{JobRegistry, Registration};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{error, info, warn};

/// Called once with the output path after a successful stitch
pub type CompletionCallback = Box<dyn FnOnce(&Path) + Send + 'static>;

/// Error type for job execution
#[derive(Debug, Error)]
pub enum JobError {
    /// List writing, tool lookup or tool execution failed
    #[error(transparent)]
    Concat(#[from] ConcatError),

    /// Worker task panicked
    #[error("Stitch task panicked: {0}")]
    Panicked(String),
}

impl JobError {
    /// True if the configured tool could not be found
    pub fn is_tool_not_found(&self) -> bool {
        matches!(self, JobError::Concat(ConcatError::ToolNotFound(_)))
    }
}

/// Details of a successful stitch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    /// Output written by the tool
    pub output: PathBuf,
    /// Whether source deletion ran (cleanup requested and output not protected)
    pub sources_removed: bool,
    /// Per-file deletion results; empty when deletion did not run
    pub cleanup: CleanupReport,
}

/// Final result of a worker
#[derive(Debug)]
pub enum JobOutcome {
    Completed(CompletedJob),
    Failed(JobError),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }

    pub fn error(&self) -> Option<&JobError> {
        match self {
            JobOutcome::Failed(e) => Some(e),
            JobOutcome::Completed(_) => None,
        }
    }
}

/// An accepted job, ready for a worker
pub struct StitchJob {
    /// Compilation name
    pub name: String,
    /// Source folder (absolute)
    pub folder: PathBuf,
    /// Output path as given by the caller
    pub output: PathBuf,
    /// Snapshot in concatenation order
    pub inputs: Vec<PathBuf>,
    /// Delete the inputs after success
    pub cleanup_sources: bool,
    /// Invoked once with the output path on success
    pub on_complete: Option<CompletionCallback>,
}

impl std::fmt::Debug for StitchJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StitchJob")
            .field("name", &self.name)
            .field("folder", &self.folder)
            .field("output", &self.output)
            .field("inputs", &self.inputs)
            .field("cleanup_sources", &self.cleanup_sources)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Settings the executor needs from the configuration
#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// Configured tool path or bare name
    pub tool_path: String,
    /// Extra tool arguments
    pub extra_args: Vec<String>,
    /// Where list files go (source folder if unset)
    pub list_dir: Option<PathBuf>,
    /// Output file name prefixes that disable source deletion
    pub protected_output_prefixes: Vec<String>,
}

impl From<&Config> for JobExecutorConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            tool_path: cfg.ffmpeg.path.clone(),
            extra_args: cfg.ffmpeg.args.clone(),
            list_dir: cfg.stitch.list_dir.clone(),
            protected_output_prefixes: cfg.stitch.protected_output_prefixes.clone(),
        }
    }
}

/// Executes stitch jobs
///
/// Holds the optional semaphore of a bounded [`SpawnPolicy`]. With the
/// default unbounded policy every worker runs the tool immediately.
pub struct JobExecutor {
    registry: Arc<JobRegistry>,
    limiter: Option<Arc<Semaphore>>,
    config: JobExecutorConfig,
}

impl JobExecutor {
    pub fn new(registry: Arc<JobRegistry>, policy: SpawnPolicy, config: JobExecutorConfig) -> Self {
        Self {
            registry,
            limiter: policy.limiter(),
            config,
        }
    }

    /// Free tool slots, or `None` when unbounded
    pub fn available_permits(&self) -> Option<usize> {
        self.limiter.as_ref().map(|s| s.available_permits())
    }

    pub fn config(&self) -> &JobExecutorConfig {
        &self.config
    }

    async fn acquire_permit(&self) -> Option<OwnedSemaphorePermit> {
        match &self.limiter {
            // The semaphore is never closed
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        }
    }

    /// Run a job through the pipeline
    ///
    /// 1. Waits for a tool slot (bounded policy only)
    /// 2. Writes the concat list and resolves the tool
    /// 3. Runs the tool on the blocking pool
    /// 4. On success: deletes sources if requested and the output is not
    ///    protected, removes the list, invokes the callback
    /// 5. On failure: removes the list, logs, leaves the sources alone
    ///
    /// `registration` is dropped on return, releasing the name.
    pub async fn execute(&self, job: StitchJob, registration: Registration) -> JobOutcome {
        let _registration = registration;
        let _permit = self.acquire_permit().await;

        self.registry.mark_running(&job.name);

        let list_dir = self
            .config
            .list_dir
            .clone()
            .unwrap_or_else(|| job.folder.clone());
        let list_path = list_file_path(&list_dir, &job.name);

        let inputs = job.inputs.clone();
        let output = job.output.clone();
        let result = self.run_tool(inputs, list_path.clone(), output).await;

        match result {
            Ok(()) => {
                info!(
                    name = %job.name,
                    output = %job.output.display(),
                    inputs = job.inputs.len(),
                    "Successfully stitched videos"
                );
                JobOutcome::Completed(self.finish(job, &list_path))
            }
            Err(e) => {
                remove_list_file(&list_path);
                match &e {
                    JobError::Concat(ConcatError::ToolNotFound(path)) => error!(
                        name = %job.name,
                        tool = %path,
                        "FFmpeg path not found; check the configuration"
                    ),
                    JobError::Concat(concat_err) if concat_err.stderr().is_some() => error!(
                        name = %job.name,
                        stderr = concat_err.stderr().unwrap_or_default(),
                        "FFmpeg error: {}",
                        concat_err
                    ),
                    other => error!(name = %job.name, "Error during video stitching: {}", other),
                }
                JobOutcome::Failed(e)
            }
        }
    }

    /// Write the list, resolve the tool and run it on the blocking pool
    ///
    /// No borrow of the job may be held across the await; it is not `Sync`.
    async fn run_tool(
        &self,
        inputs: Vec<PathBuf>,
        list_path: PathBuf,
        output: PathBuf,
    ) -> Result<(), JobError> {
        let tool_path = self.config.tool_path.clone();
        let extra_args = self.config.extra_args.clone();

        let result = tokio::task::spawn_blocking(move || -> Result<(), ConcatError> {
            write_concat_list(&list_path, &inputs)?;
            let tool = resolve_tool(&tool_path)?;
            run_concat(&ConcatParams::new(tool, list_path, extra_args, output))
        })
        .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(JobError::Concat(e)),
            Err(join_err) => Err(JobError::Panicked(join_err.to_string())),
        }
    }

    /// Success path: source deletion, list removal, callback
    fn finish(&self, job: StitchJob, list_path: &Path) -> CompletedJob {
        let protected = is_protected_output(&job.output, &self.config.protected_output_prefixes);
        let sources_removed = job.cleanup_sources && !protected;

        let cleanup = if sources_removed {
            delete_sources(&job.inputs, &job.output)
        } else {
            if job.cleanup_sources {
                warn!(
                    name = %job.name,
                    output = %job.output.display(),
                    "Output is protected; keeping source videos"
                );
            }
            CleanupReport::default()
        };

        remove_list_file(list_path);

        if let Some(callback) = job.on_complete {
            callback(&job.output);
        }

        CompletedJob {
            output: job.output,
            sources_removed,
            cleanup,
        }
    }
}
