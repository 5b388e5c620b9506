//! Entering the namespaces of a running container via `setns(2)`.

use std::fs::File;
use std::path::PathBuf;

use burrow_common::error::{BurrowError, Result};
use nix::sched::{CloneFlags, setns};

/// Namespaces entered by `exec`, in order. `mnt` comes last because it
/// changes how the remaining `/proc/<pid>/ns` paths would resolve.
pub const EXEC_NAMESPACES: [&str; 5] = ["ipc", "uts", "net", "pid", "mnt"];

/// Path of a namespace handle of `pid`.
#[must_use]
pub fn namespace_path(pid: i32, kind: &str) -> PathBuf {
    PathBuf::from(format!("/proc/{pid}/ns/{kind}"))
}

/// Joins one namespace of `pid`.
///
/// # Errors
///
/// Returns an error if the handle cannot be opened or `setns(2)` fails.
pub fn join_namespace(pid: i32, kind: &str) -> Result<()> {
    let path = namespace_path(pid, kind);
    let file = File::open(&path).map_err(|e| BurrowError::io(&path, e))?;
    setns(&file, CloneFlags::empty())
        .map_err(|e| BurrowError::syscall(format!("setns {kind} of pid {pid}"), e))
}

/// Joins every namespace in [`EXEC_NAMESPACES`], continuing past failures.
///
/// Must be called while the process is still single-threaded: the kernel
/// refuses a mount namespace switch from a multi-threaded process.
/// Returns the failures, each tagged with its namespace.
pub fn enter_container_namespaces(pid: i32) -> Vec<(&'static str, BurrowError)> {
    EXEC_NAMESPACES
        .iter()
        .filter_map(|kind| join_namespace(pid, kind).err().map(|e| (*kind, e)))
        .collect()
}
