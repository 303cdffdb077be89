//! Post-processing after a successful stitch.
//!
//! Source deletion is per-file: one failure is logged and recorded but never
//! stops the remaining deletions or fails the job.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Result of deleting the snapshot sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files that were removed.
    pub deleted: Vec<PathBuf>,
    /// Files that could not be removed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    /// True if every attempted deletion succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Checks whether the output file name starts with a protected prefix.
///
/// Protected outputs are intermediate compilations that may live in the
/// source folder; their sources are never deleted. Empty prefixes are
/// ignored.
pub fn is_protected_output(output: &Path, prefixes: &[String]) -> bool {
    let Some(name) = output.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    prefixes
        .iter()
        .any(|prefix| !prefix.is_empty() && name.starts_with(prefix.as_str()))
}

/// Deletes every source file, skipping the output path itself.
///
/// # Arguments
/// * `sources` - Snapshot entries in concatenation order
/// * `output` - The freshly produced output, which is never removed
pub fn delete_sources(sources: &[PathBuf], output: &Path) -> CleanupReport {
    let mut report = CleanupReport::default();

    for source in sources {
        if source == output {
            continue;
        }

        match fs::remove_file(source) {
            Ok(()) => {
                info!(path = %source.display(), "Deleted source video");
                report.deleted.push(source.clone());
            }
            Err(e) => {
                error!(path = %source.display(), error = %e, "Failed to delete source video");
                report.failed.push((source.clone(), e.to_string()));
            }
        }
    }

    report
}

/// Removes the concat list. Errors are ignored.
pub fn remove_list_file(list_path: &Path) {
    let _ = fs::remove_file(list_path);
}
