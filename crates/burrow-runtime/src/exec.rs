//! Running a command inside a running container.
//!
//! `exec` re-launches this binary with [`ENV_EXEC_PID`] and
//! [`ENV_EXEC_CMD`] set. The new process notices them before anything else
//! starts (see [`crate::entry`]), joins the container's namespaces while
//! still single-threaded and runs the command there.

use std::path::PathBuf;
use std::process::Command;

use burrow_common::constants::{ENV_EXEC_CMD, ENV_EXEC_PID};
use burrow_common::error::{BurrowError, Result};

use crate::process::{SELF_EXE, join_command};

/// Path of a process's initial environment.
#[must_use]
pub fn environ_path(pid: i32) -> PathBuf {
    PathBuf::from(format!("/proc/{pid}/environ"))
}

/// Splits a NUL-separated `environ` blob into `(key, value)` pairs.
///
/// Entries without `=` are dropped.
#[must_use]
pub fn parse_environ(raw: &[u8]) -> Vec<(String, String)> {
    raw.split(|b| *b == 0)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let text = String::from_utf8_lossy(entry);
            text.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect()
}

/// Reads the environment of a container's init process.
///
/// # Errors
///
/// Returns an error if `/proc/<pid>/environ` cannot be read.
pub fn read_environ(pid: i32) -> Result<Vec<(String, String)>> {
    let path = environ_path(pid);
    let raw = std::fs::read(&path).map_err(|e| BurrowError::io(&path, e))?;
    Ok(parse_environ(&raw))
}

/// Runs `argv` inside the namespaces of `pid` and returns its exit code.
///
/// Standard streams are inherited. The command sees the host environment
/// with the container's environment layered on top.
///
/// # Errors
///
/// Returns an error if `argv` is empty, the container environment cannot
/// be read, or the helper process cannot be spawned.
pub fn exec_in_container(pid: i32, argv: &[String]) -> Result<i32> {
    if argv.is_empty() {
        return Err(BurrowError::Config {
            message: "exec command is empty".into(),
        });
    }
    let env = read_environ(pid)?;
    let command = join_command(argv);
    tracing::info!(pid, command = %command, "exec into container");

    let status = Command::new(SELF_EXE)
        .envs(env)
        .env(ENV_EXEC_PID, pid.to_string())
        .env(ENV_EXEC_CMD, &command)
        .status()
        .map_err(|e| BurrowError::io(SELF_EXE, e))?;
    Ok(status.code().unwrap_or(-1))
}
