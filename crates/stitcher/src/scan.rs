//! Input snapshot capture for a source folder.
//!
//! The snapshot is taken once, at submission time: files that appear in the
//! folder afterwards are never part of the job.

use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

/// A media file captured from the source folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Full path to the file.
    pub path: PathBuf,
    /// Last modified time at capture.
    pub modified: SystemTime,
}

/// Checks if a file name ends in `.<extension>` (ASCII case-insensitive).
///
/// `extension` may be given with or without its leading dot. The name is
/// compared as raw bytes, so names that are not valid UTF-8 still match.
pub fn has_media_extension(path: &Path, extension: &str) -> bool {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        return false;
    }

    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.as_encoded_bytes();

    let suffix_len = extension.len() + 1;
    if name.len() <= suffix_len {
        return false;
    }

    let (stem, suffix) = name.split_at(name.len() - suffix_len);
    !stem.is_empty()
        && suffix[0] == b'.'
        && suffix[1..].eq_ignore_ascii_case(extension.as_bytes())
}

/// Captures the media files directly inside `folder`.
///
/// Only regular files (symlinks are followed) whose name carries the media
/// extension are kept; subdirectories are not descended into. The result is
/// in directory order; callers apply their own ordering.
///
/// # Errors
/// Returns the IO error if `folder` itself cannot be read. Entries that
/// vanish or cannot be stat'ed while listing are skipped.
pub fn capture_snapshot(folder: &Path, extension: &str) -> io::Result<Vec<SnapshotEntry>> {
    let mut entries = Vec::new();

    let walker = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(io::Error::from(e)),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable folder entry");
                continue;
            }
        };

        if !entry.file_type().is_file() || !has_media_extension(entry.path(), extension) {
            continue;
        }

        let modified = match entry.metadata() {
            Ok(metadata) => metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "Skipping entry without metadata");
                continue;
            }
        };

        entries.push(SnapshotEntry {
            path: entry.into_path(),
            modified,
        });
    }

    Ok(entries)
}

/// Orders entries by modification time, oldest first.
///
/// The sort is stable; ties keep file name order so the result does not
/// depend on directory iteration order.
pub fn order_by_modified(entries: &mut [SnapshotEntry]) {
    entries.sort_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
    });
}

/// Orders entries with a caller-supplied comparator over paths.
pub fn order_with<F>(entries: &mut [SnapshotEntry], compare: F)
where
    F: Fn(&Path, &Path) -> Ordering,
{
    entries.sort_by(|a, b| compare(&a.path, &b.path));
}
