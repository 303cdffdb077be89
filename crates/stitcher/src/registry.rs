//! Registry of in-flight stitch jobs.
//!
//! The registry is the only deduplication authority: a compilation name can
//! be registered at most once at any instant. All reads and mutations go
//! through a single mutex.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Status of a registered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Registered, worker not yet running the tool.
    Started,
    /// Worker has picked the job up.
    Running,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Started
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Started => write!(f, "started"),
            JobStatus::Running => write!(f, "running"),
        }
    }
}

/// Metadata kept for each active job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    /// Compilation name (registry key).
    pub name: String,
    /// Source folder the inputs were taken from.
    pub folder: PathBuf,
    /// Output path the tool writes to.
    pub output: PathBuf,
    /// Unix timestamp (milliseconds) of registration.
    pub started_at: i64,
    pub status: JobStatus,
}

/// Get current timestamp in milliseconds since Unix epoch.
fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Process-wide map from compilation name to job record.
///
/// Constructed once and shared by `Arc`; there is no global instance.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically registers `name` unless it is already present.
    ///
    /// Returns false, without touching the existing record, when the name is
    /// taken.
    pub fn try_register(&self, name: &str, folder: &Path, output: &Path) -> bool {
        let mut jobs = self.lock();
        if jobs.contains_key(name) {
            return false;
        }
        jobs.insert(
            name.to_string(),
            JobRecord {
                name: name.to_string(),
                folder: folder.to_path_buf(),
                output: output.to_path_buf(),
                started_at: current_timestamp_ms(),
                status: JobStatus::Started,
            },
        );
        true
    }

    /// Removes `name`. No-op if absent.
    pub fn unregister(&self, name: &str) {
        self.lock().remove(name);
    }

    /// Point-in-time membership check.
    pub fn is_active(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Marks a registered job as running. No-op if absent.
    pub fn mark_running(&self, name: &str) {
        if let Some(record) = self.lock().get_mut(name) {
            record.status = JobStatus::Running;
        }
    }

    /// Copy of the record for `name`, if registered.
    pub fn get(&self, name: &str) -> Option<JobRecord> {
        self.lock().get(name).cloned()
    }

    /// Copies of all records, oldest registration first.
    pub fn snapshot(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        records
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// A successful registration that is released when dropped.
///
/// The worker owns this for the lifetime of the job, so the registry entry
/// is removed on every exit path, unwinding included.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<JobRegistry>,
    name: String,
}

impl Registration {
    /// Registers `name`, returning `None` if it is already active.
    pub fn acquire(
        registry: &Arc<JobRegistry>,
        name: &str,
        folder: &Path,
        output: &Path,
    ) -> Option<Self> {
        if registry.try_register(name, folder, output) {
            Some(Self {
                registry: Arc::clone(registry),
                name: name.to_string(),
            })
        } else {
            None
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(&self.name);
    }
}
