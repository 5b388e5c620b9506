//! CPU resource control via cgroups v2.
//!
//! Manages `cpu.weight` and `cpuset.cpus`.

use std::path::Path;

use burrow_common::error::{BurrowError, Result};

/// Sets the CPU weight (shares) for a cgroup.
///
/// Weight is a value between 1 and 10000 that controls the relative
/// share of CPU time this cgroup receives under contention.
///
/// # Errors
///
/// Returns an error if writing to `cpu.weight` fails.
pub fn set_cpu_weight(cgroup_path: &Path, weight: u64) -> Result<()> {
    let file = cgroup_path.join("cpu.weight");
    std::fs::write(&file, weight.to_string()).map_err(|e| BurrowError::io(file, e))?;
    tracing::debug!(weight, "CPU weight set");
    Ok(())
}

/// Restricts the cgroup to a CPU list such as `0-1` or `0,2`.
///
/// # Errors
///
/// Returns an error if writing to `cpuset.cpus` fails.
pub fn set_cpuset_cpus(cgroup_path: &Path, cpus: &str) -> Result<()> {
    let file = cgroup_path.join("cpuset.cpus");
    std::fs::write(&file, cpus).map_err(|e| BurrowError::io(file, e))?;
    tracing::debug!(cpus, "cpuset set");
    Ok(())
}
