//! Stand-in tools and fixtures for tests.

use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Writes an executable shell script named `name` into `dir`.
pub(crate) fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A tool that behaves like a successful concat: after `delay_secs` it copies
/// the list it was given into the output file and records its arguments in
/// `<output>.args`.
pub(crate) fn concat_tool(dir: &Path, delay_secs: u32) -> PathBuf {
    let body = format!(
        r#"prev=""
list=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then list="$arg"; fi
  prev="$arg"
done
out="$prev"
sleep {delay_secs}
printf '%s\n' "$@" > "$out.args"
cat "$list" > "$out""#
    );
    write_tool(dir, "fake-ffmpeg", &body)
}

/// A tool that prints `stderr` and exits with `code`.
pub(crate) fn failing_tool(dir: &Path, code: i32, stderr: &str) -> PathBuf {
    write_tool(
        dir,
        "broken-ffmpeg",
        &format!("echo '{}' >&2\nexit {}", stderr, code),
    )
}

/// Creates a file with the given modification time (seconds since epoch).
pub(crate) fn media_file(dir: &Path, name: &str, mtime_secs: u64) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(mtime_secs))
        .unwrap();
    path
}
