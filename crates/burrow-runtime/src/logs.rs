//! Container log files.
//!
//! A detached container's stdout and stderr go to
//! `<info_root>/<name>/container.log`. Foreground containers write to the
//! terminal and have no log file.

use std::fs::File;
use std::path::PathBuf;

use burrow_common::config::RuntimePaths;
use burrow_common::error::{BurrowError, Result};

/// Returns the log file path for a container.
#[must_use]
pub fn log_path(paths: &RuntimePaths, name: &str) -> PathBuf {
    paths.log_file(name)
}

/// Creates the container's metadata directory and truncates its log file.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn create_log(paths: &RuntimePaths, name: &str) -> Result<File> {
    let dir = paths.container_info_dir(name);
    std::fs::create_dir_all(&dir).map_err(|e| BurrowError::io(&dir, e))?;
    let path = log_path(paths, name);
    let file = File::create(&path).map_err(|e| BurrowError::io(&path, e))?;
    tracing::debug!(path = %path.display(), "container log created");
    Ok(file)
}

/// Reads a container's log as raw bytes.
///
/// The log is the container's redirected stdout and stderr, so it is not
/// assumed to be UTF-8. A container without a log file, which is the case
/// for foreground containers, yields an empty buffer.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_log(paths: &RuntimePaths, name: &str) -> Result<Vec<u8>> {
    let path = log_path(paths, name);
    match std::fs::read(&path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(BurrowError::io(path, e)),
    }
}
