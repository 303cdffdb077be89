//! Folder Stitch
//!
//! Named, deduplicated compilation jobs: every media file in a folder is
//! concatenated with ffmpeg's concat demuxer (stream copy), and the sources
//! are removed once the output exists.

pub mod cleanup;
pub mod concat;
pub mod concurrency;
pub mod job_executor;
pub mod registry;
pub mod scan;
pub mod stitcher;
pub mod status_server;

#[cfg(all(test, unix))]
mod test_support;

pub use cleanup::{delete_sources, is_protected_output, CleanupReport};
pub use concat::{build_concat_command, run_concat, ConcatError, ConcatParams};
pub use concurrency::SpawnPolicy;
pub use folder_stitch_config as config;
pub use folder_stitch_config::Config;
pub use job_executor::{CompletedJob, JobError, JobExecutor, JobExecutorConfig, JobOutcome, StitchJob};
pub use registry::{JobRecord, JobRegistry, JobStatus, Registration};
pub use scan::{capture_snapshot, SnapshotEntry};
pub use stitcher::{
    by_file_name, default_output_path, Comparator, JobHandle, StitchRequest, Stitcher,
    SubmitError, SubmittedJob,
};
pub use status_server::{create_status_router, run_status_server, InputOrder, ServerError};
