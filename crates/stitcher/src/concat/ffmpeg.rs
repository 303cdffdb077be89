//! FFmpeg concat demuxer runner
//!
//! Writes the concat list for a job, resolves the ffmpeg binary and runs a
//! stream-copy concatenation into the output path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Tool used when the configured path is empty.
pub const DEFAULT_TOOL: &str = "ffmpeg";

/// Prefix of the per-job concat list file name.
pub const LIST_FILE_PREFIX: &str = "file_list_";

/// Error type for concat operations
#[derive(Debug, Error)]
pub enum ConcatError {
    /// Configured tool could not be located
    #[error("FFmpeg path not found: {0}")]
    ToolNotFound(String),

    /// Concat list could not be written
    #[error("Failed to write concat list {}: {source}", .path.display())]
    ListWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Process could not be started
    #[error("Failed to launch ffmpeg: {0}")]
    Launch(#[source] io::Error),

    /// Process exited with non-zero status
    #[error("FFmpeg failed with exit code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    /// Process was terminated by signal
    #[error("FFmpeg was terminated by signal: {stderr}")]
    Terminated { stderr: String },
}

impl ConcatError {
    /// Diagnostic output captured from the tool, if it ran.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ConcatError::Failed { stderr, .. } | ConcatError::Terminated { stderr } => {
                Some(stderr)
            }
            _ => None,
        }
    }
}

/// Parameters for one concat invocation
#[derive(Debug, Clone)]
pub struct ConcatParams {
    /// Resolved tool binary
    pub tool: PathBuf,
    /// Concat list file passed as input
    pub list_path: PathBuf,
    /// Configured extra arguments, placed before the output path
    pub extra_args: Vec<String>,
    /// Output file
    pub output_path: PathBuf,
}

impl ConcatParams {
    pub fn new(
        tool: PathBuf,
        list_path: PathBuf,
        extra_args: Vec<String>,
        output_path: PathBuf,
    ) -> Self {
        Self {
            tool,
            list_path,
            extra_args,
            output_path,
        }
    }
}

/// Encodes a compilation name into a file-name-safe token.
///
/// ASCII alphanumerics, `-` and `_` are kept; every other byte becomes
/// `%XX`. The encoding is injective, so distinct names never share a list
/// file.
pub fn encode_list_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

/// Path of the concat list for the job `name` inside `dir`.
pub fn list_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}{}.txt", LIST_FILE_PREFIX, encode_list_name(name)))
}

/// Quotes a path for a concat list line.
///
/// A single quote cannot appear inside a quoted string, so it is closed,
/// escaped and reopened: `it's` becomes `'it'\''s'`.
pub fn quote_concat_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Renders the concat list: one `file '<path>'` line per input, in order.
pub fn render_concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|path| format!("file {}\n", quote_concat_path(path)))
        .collect()
}

/// Writes the concat list for `inputs` to `list_path`.
pub fn write_concat_list(list_path: &Path, inputs: &[PathBuf]) -> Result<(), ConcatError> {
    fs::write(list_path, render_concat_list(inputs)).map_err(|source| ConcatError::ListWrite {
        path: list_path.to_path_buf(),
        source,
    })
}

/// Resolves the configured tool to an existing file.
///
/// An empty value falls back to [`DEFAULT_TOOL`]. A path that exists is used
/// as-is; a bare program name is otherwise looked up on `PATH`.
///
/// # Errors
/// `ConcatError::ToolNotFound` if nothing on disk matches.
pub fn resolve_tool(configured: &str) -> Result<PathBuf, ConcatError> {
    let configured = configured.trim();
    let configured = if configured.is_empty() {
        DEFAULT_TOOL
    } else {
        configured
    };

    let path = Path::new(configured);
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    let is_bare_name = path.components().count() == 1 && path.parent() == Some(Path::new(""));
    if is_bare_name {
        if let Ok(found) = which::which(configured) {
            return Ok(found);
        }
    }

    Err(ConcatError::ToolNotFound(configured.to_string()))
}

/// Build the concat command
///
/// Argument order is fixed: concat demuxer with relaxed path safety, the
/// list as input, stream copy, the configured extra arguments, then the
/// output path.
pub fn build_concat_command(params: &ConcatParams) -> Command {
    let mut cmd = Command::new(&params.tool);

    cmd.arg("-f").arg("concat");
    cmd.arg("-safe").arg("0");
    cmd.arg("-i").arg(&params.list_path);
    cmd.arg("-c").arg("copy");
    cmd.args(&params.extra_args);
    cmd.arg(&params.output_path);

    cmd
}

/// Execute a concat invocation, blocking until the tool exits.
///
/// # Returns
/// * `Ok(())` - Tool exited with status zero
/// * `Err(ConcatError)` - Launch failure, non-zero exit or signal, with the
///   captured stderr attached
pub fn run_concat(params: &ConcatParams) -> Result<(), ConcatError> {
    let output = build_concat_command(params)
        .output()
        .map_err(ConcatError::Launch)?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    match output.status.code() {
        Some(code) => Err(ConcatError::Failed { code, stderr }),
        None => Err(ConcatError::Terminated { stderr }),
    }
}
