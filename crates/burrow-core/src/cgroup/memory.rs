//! Memory resource control via cgroups v2.
//!
//! Manages `memory.max`.

use std::path::Path;

use burrow_common::error::{BurrowError, Result};

/// Sets the hard memory limit for a cgroup.
///
/// `limit` is written verbatim, so any unit suffix the kernel accepts
/// (`100m`, `1G`, `max`) works.
///
/// # Errors
///
/// Returns an error if writing to `memory.max` fails.
pub fn set_memory_max(cgroup_path: &Path, limit: &str) -> Result<()> {
    let file = cgroup_path.join("memory.max");
    std::fs::write(&file, limit).map_err(|e| BurrowError::io(file, e))?;
    tracing::debug!(limit, "memory max limit set");
    Ok(())
}
