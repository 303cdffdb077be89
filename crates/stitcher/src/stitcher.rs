//! Submission orchestrator
//!
//! Validates a request, captures and orders the input snapshot, claims the
//! compilation name and hands the job to a freshly spawned worker. `submit`
//! returns as soon as the worker is spawned; it never waits on the tool.

use crate::concurrency::SpawnPolicy;
use crate::config::Config;
use crate::job_executor::{CompletionCallback, JobError, JobExecutor, JobExecutorConfig};
use crate::job_executor::{JobOutcome, StitchJob};
use crate::registry::{JobRegistry, Registration};
use crate::scan::{capture_snapshot, order_by_modified, order_with};
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Orders two input paths; replaces the default modification-time order
pub type Comparator = Arc<dyn Fn(&Path, &Path) -> Ordering + Send + Sync>;

/// Comparator ordering inputs by file name
pub fn by_file_name() -> Comparator {
    Arc::new(|a: &Path, b: &Path| a.file_name().cmp(&b.file_name()))
}

/// Error type for rejected submissions
///
/// A rejected submission never touches the registry.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Compilation name must not be empty")]
    InvalidName,

    /// A job with this name is already in flight
    #[error("Already stitching compilation '{0}'")]
    Duplicate(String),

    #[error("Folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("No video files found to stitch in {}", .0.display())]
    NoMediaFiles(PathBuf),

    #[error("Failed to read folder {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `submit` was called outside a Tokio runtime
    #[error("No Tokio runtime available to run the stitch job")]
    NoRuntime,
}

impl SubmitError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, SubmitError::Duplicate(_))
    }
}

/// A stitch request
pub struct StitchRequest {
    pub name: String,
    pub folder: PathBuf,
    pub output: PathBuf,
    pub comparator: Option<Comparator>,
    pub cleanup_sources: bool,
    pub on_complete: Option<CompletionCallback>,
}

impl StitchRequest {
    /// New request with default ordering and source cleanup enabled
    pub fn new(
        name: impl Into<String>,
        folder: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            output: output.into(),
            comparator: None,
            cleanup_sources: true,
            on_complete: None,
        }
    }

    /// Order inputs with `comparator` instead of by modification time
    pub fn with_comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = Some(comparator);
        self
    }

    pub fn cleanup_sources(mut self, cleanup: bool) -> Self {
        self.cleanup_sources = cleanup;
        self
    }

    /// Callback invoked once with the output path if the tool succeeds
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&Path) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for StitchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StitchRequest")
            .field("name", &self.name)
            .field("folder", &self.folder)
            .field("output", &self.output)
            .field("comparator", &self.comparator.is_some())
            .field("cleanup_sources", &self.cleanup_sources)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Handle to a spawned worker
///
/// Dropping the handle detaches the worker; it still runs to completion.
#[derive(Debug)]
pub struct JobHandle {
    name: String,
    inner: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the worker and return its outcome
    pub async fn wait(self) -> JobOutcome {
        match self.inner.await {
            Ok(outcome) => outcome,
            Err(join_err) => JobOutcome::Failed(JobError::Panicked(join_err.to_string())),
        }
    }
}

/// An accepted submission
#[derive(Debug)]
pub struct SubmittedJob {
    /// Where the output will be written; not a promise that it will be
    pub output: PathBuf,
    pub handle: JobHandle,
}

/// Default output for a folder: `<folder>.<extension>` next to the folder
///
/// Falls back to `<folder>/<name>.<extension>` when the folder has no file
/// name component (e.g. `.` or `/`).
pub fn default_output_path(folder: &Path, name: &str, extension: &str) -> PathBuf {
    let extension = extension.trim_start_matches('.');
    match (folder.file_name(), folder.parent()) {
        (Some(dir), Some(parent)) => {
            parent.join(format!("{}.{}", dir.to_string_lossy(), extension))
        }
        _ => folder.join(format!("{}.{}", name, extension)),
    }
}

/// Accepts stitch submissions and spawns their workers
pub struct Stitcher {
    config: Config,
    registry: Arc<JobRegistry>,
    executor: Arc<JobExecutor>,
}

impl Stitcher {
    /// Create a stitcher with its own registry
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, Arc::new(JobRegistry::new()))
    }

    /// Create a stitcher sharing an existing registry
    pub fn with_registry(config: Config, registry: Arc<JobRegistry>) -> Self {
        let policy = SpawnPolicy::from_config(&config.stitch);
        let executor = Arc::new(JobExecutor::new(
            registry.clone(),
            policy,
            JobExecutorConfig::from(&config),
        ));

        Self {
            config,
            registry,
            executor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    /// True while a job named `name` is registered
    pub fn is_active(&self, name: &str) -> bool {
        self.registry.is_active(name)
    }

    /// Submit a stitch job
    ///
    /// Validation runs in order and stops at the first failure:
    /// 1. The name is not already active
    /// 2. The folder exists and is a directory
    /// 3. The folder holds at least one media file (snapshot taken here)
    /// 4. The name is claimed atomically (a lost race is a duplicate)
    ///
    /// The snapshot is then ordered and handed to a new worker task on the
    /// current Tokio runtime; without one the request is rejected with
    /// `SubmitError::NoRuntime` before anything is registered.
    ///
    /// # Returns
    /// * `Ok(SubmittedJob)` - The predicted output path and the worker handle
    /// * `Err(SubmitError)` - Rejected; nothing was registered or spawned
    pub fn submit(&self, request: StitchRequest) -> Result<SubmittedJob, SubmitError> {
        let StitchRequest {
            name,
            folder,
            output,
            comparator,
            cleanup_sources,
            on_complete,
        } = request;

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SubmitError::NoRuntime)?;

        if name.is_empty() {
            return Err(SubmitError::InvalidName);
        }

        if self.registry.is_active(&name) {
            warn!(name = %name, "Already stitching compilation. Skipping request.");
            return Err(SubmitError::Duplicate(name));
        }

        let folder = validate_folder(&folder)?;

        let mut snapshot = capture_snapshot(&folder, &self.config.stitch.media_extension)
            .map_err(|source| SubmitError::Io {
                path: folder.clone(),
                source,
            })?;
        if snapshot.is_empty() {
            warn!(folder = %folder.display(), "No video files found to stitch.");
            return Err(SubmitError::NoMediaFiles(folder));
        }

        let registration = match Registration::acquire(&self.registry, &name, &folder, &output) {
            Some(registration) => registration,
            None => {
                warn!(name = %name, "Lost registration race. Skipping request.");
                return Err(SubmitError::Duplicate(name));
            }
        };

        match &comparator {
            Some(compare) => order_with(&mut snapshot, |a, b| compare(a, b)),
            None => order_by_modified(&mut snapshot),
        }

        let inputs: Vec<PathBuf> = snapshot.into_iter().map(|entry| entry.path).collect();

        info!(name = %name, inputs = inputs.len(), "Stitching videos");
        for input in &inputs {
            debug!(name = %name, "- {}", input.display());
        }

        let job = StitchJob {
            name: name.clone(),
            folder,
            output: output.clone(),
            inputs,
            cleanup_sources,
            on_complete,
        };

        let executor = self.executor.clone();
        let inner = runtime.spawn(async move { executor.execute(job, registration).await });

        Ok(SubmittedJob {
            output,
            handle: JobHandle { name, inner },
        })
    }
}

/// Check the folder and return its absolute form
fn validate_folder(folder: &Path) -> Result<PathBuf, SubmitError> {
    let metadata = match fs::metadata(folder) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(folder = %folder.display(), "Invalid folder path");
            return Err(SubmitError::FolderNotFound(folder.to_path_buf()));
        }
        Err(source) => {
            return Err(SubmitError::Io {
                path: folder.to_path_buf(),
                source,
            })
        }
    };

    if !metadata.is_dir() {
        warn!(folder = %folder.display(), "Invalid folder path");
        return Err(SubmitError::NotADirectory(folder.to_path_buf()));
    }

    fs::canonicalize(folder).map_err(|source| SubmitError::Io {
        path: folder.to_path_buf(),
        source,
    })
}
