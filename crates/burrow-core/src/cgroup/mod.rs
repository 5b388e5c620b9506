//! Cgroups v2 resource management.
//!
//! The runtime keeps a single node, `<cgroup2 mount>/burrow`, that receives
//! memory and CPU limits and the PIDs of containers. The mountpoint is
//! discovered from the mount table once and cached in [`CgroupRoot`].

pub mod cpu;
pub mod memory;

use std::ffi::OsString;
use std::io::Write;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use burrow_common::error::{BurrowError, Result};
use burrow_common::types::ResourceConfig;

/// Default location of the mount table.
pub const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// Filesystem type of the unified hierarchy.
const CGROUP2_FSTYPE: &str = "cgroup2";

/// Lazily resolved, cached cgroup2 mountpoint.
///
/// The first caller scans the mount table; every later caller, on any
/// thread, reads the cached answer. A host without cgroup2 caches the
/// absence too, so every call reports [`BurrowError::CgroupNotMounted`].
#[derive(Debug)]
pub struct CgroupRoot {
    source: RootSource,
    resolved: OnceLock<Option<PathBuf>>,
}

#[derive(Debug)]
enum RootSource {
    Mountinfo(PathBuf),
    Fixed(PathBuf),
}

impl CgroupRoot {
    /// Resolves from `/proc/self/mountinfo`.
    #[must_use]
    pub fn from_mount_table() -> Self {
        Self::from_mountinfo(MOUNTINFO_PATH)
    }

    /// Resolves from a mountinfo-formatted file at `path`.
    pub fn from_mountinfo(path: impl Into<PathBuf>) -> Self {
        Self {
            source: RootSource::Mountinfo(path.into()),
            resolved: OnceLock::new(),
        }
    }

    /// Uses `path` as the cgroup2 mount without scanning.
    pub fn fixed(path: impl Into<PathBuf>) -> Self {
        Self {
            source: RootSource::Fixed(path.into()),
            resolved: OnceLock::new(),
        }
    }

    /// Returns the cgroup2 mountpoint.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::CgroupNotMounted`] if no cgroup2 entry exists.
    pub fn mountpoint(&self) -> Result<&Path> {
        self.resolved
            .get_or_init(|| self.resolve())
            .as_deref()
            .ok_or(BurrowError::CgroupNotMounted)
    }

    fn resolve(&self) -> Option<PathBuf> {
        match &self.source {
            RootSource::Fixed(path) => Some(path.clone()),
            RootSource::Mountinfo(table) => {
                let found = std::fs::read_to_string(table)
                    .map_err(|e| {
                        tracing::warn!(path = %table.display(), error = %e, "cannot read mount table");
                    })
                    .ok()
                    .and_then(|text| find_cgroup2_mountpoint(&text));
                match &found {
                    Some(path) => tracing::debug!(mount = %path.display(), "cgroup2 mountpoint resolved"),
                    None => tracing::warn!("no cgroup2 mount found"),
                }
                found
            }
        }
    }
}

/// Finds the mount point of the first `cgroup2` entry in mountinfo text.
///
/// Mountinfo lines put the mount point in field 5 and the filesystem type
/// right after the ` - ` separator.
#[must_use]
pub fn find_cgroup2_mountpoint(mountinfo: &str) -> Option<PathBuf> {
    mountinfo.lines().find_map(|line| {
        let (mount_fields, fs_fields) = line.split_once(" - ")?;
        let fstype = fs_fields.split_whitespace().next()?;
        if fstype != CGROUP2_FSTYPE {
            return None;
        }
        mount_fields.split_whitespace().nth(4).map(unescape_mount_path)
    })
}

/// Decodes the `\ooo` octal escapes the kernel uses for space, tab,
/// newline and backslash in mountinfo paths.
fn unescape_mount_path(field: &str) -> PathBuf {
    let raw = field.as_bytes();
    let mut decoded = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let escape = raw.get(i + 1..i + 4).filter(|digits| {
            raw[i] == b'\\' && digits.iter().all(|d| (b'0'..=b'7').contains(d))
        });
        match escape {
            Some(digits) => {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                decoded.push(u8::try_from(value).unwrap_or(b'?'));
                i += 4;
            }
            None => {
                decoded.push(raw[i]);
                i += 1;
            }
        }
    }
    PathBuf::from(OsString::from_vec(decoded))
}

/// Handle to the runtime's node in the cgroup2 hierarchy.
#[derive(Debug, Clone)]
pub struct CgroupController {
    name: String,
    root: Arc<CgroupRoot>,
}

impl CgroupController {
    /// Creates a handle for the node `name` under `root`. Nothing is
    /// created on disk until [`set`](Self::set) or [`apply`](Self::apply).
    pub fn new(name: impl Into<String>, root: Arc<CgroupRoot>) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    /// Path of this node.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::CgroupNotMounted`] without a cgroup2 mount.
    pub fn path(&self) -> Result<PathBuf> {
        Ok(self.root.mountpoint()?.join(&self.name))
    }

    fn ensure_node(&self) -> Result<PathBuf> {
        let path = self.path()?;
        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(|e| BurrowError::io(&path, e))?;
            tracing::info!(path = %path.display(), "cgroup created");
        }
        Ok(path)
    }

    /// Writes the requested limits; unset fields are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be created or a control file
    /// rejects the value.
    pub fn set(&self, config: &ResourceConfig) -> Result<()> {
        let path = self.ensure_node()?;
        if !config.memory_limit.is_empty() {
            memory::set_memory_max(&path, &config.memory_limit)?;
        }
        if let Some(weight) = config.cpu_weight {
            cpu::set_cpu_weight(&path, weight)?;
        }
        if let Some(cpus) = &config.cpu_set {
            cpu::set_cpuset_cpus(&path, cpus)?;
        }
        Ok(())
    }

    /// Moves `pid` into this node by writing `cgroup.procs`.
    ///
    /// Applying a PID that is already listed is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be created or the write fails.
    pub fn apply(&self, pid: i32) -> Result<()> {
        let path = self.ensure_node()?;
        let procs_path = path.join("cgroup.procs");
        let pid_text = pid.to_string();

        if let Ok(current) = std::fs::read_to_string(&procs_path) {
            if current.lines().any(|line| line.trim() == pid_text) {
                tracing::debug!(pid, "process already in cgroup");
                return Ok(());
            }
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&procs_path)
            .map_err(|e| BurrowError::io(&procs_path, e))?;
        writeln!(file, "{pid_text}").map_err(|e| BurrowError::io(&procs_path, e))?;
        tracing::debug!(pid, "added process to cgroup");
        Ok(())
    }

    /// Removes the node. The kernel refuses while processes remain in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn destroy(&self) -> Result<()> {
        let path = self.path()?;
        std::fs::remove_dir(&path).map_err(|e| BurrowError::io(&path, e))?;
        tracing::info!(path = %path.display(), "cgroup destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOUNTINFO: &str = "\
22 1 8:1 / / rw,relatime shared:1 - ext4 /dev/sda1 rw
25 22 0:23 / /proc rw,nosuid,nodev,noexec,relatime shared:13 - proc proc rw
31 22 0:27 / /sys/fs/cgroup rw,nosuid,nodev,noexec,relatime shared:9 - cgroup2 cgroup2 rw,nsdelegate
";

    #[test]
    fn finds_cgroup2_mountpoint() {
        assert_eq!(
            find_cgroup2_mountpoint(MOUNTINFO),
            Some(PathBuf::from("/sys/fs/cgroup"))
        );
    }

    #[test]
    fn escaped_mountpoint_is_decoded() {
        let text = "31 22 0:27 / /mnt/my\\040cgroup\\134x rw shared:9 - cgroup2 cgroup2 rw\n";
        assert_eq!(
            find_cgroup2_mountpoint(text),
            Some(PathBuf::from("/mnt/my cgroup\\x"))
        );
    }

    #[test]
    fn no_cgroup2_entry_yields_none() {
        let text = "22 1 8:1 / / rw shared:1 - ext4 /dev/sda1 rw\n";
        assert_eq!(find_cgroup2_mountpoint(text), None);
    }

    #[test]
    fn missing_mount_is_reported_every_time() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("mountinfo");
        std::fs::write(&table, "22 1 8:1 / / rw shared:1 - ext4 /dev/sda1 rw\n").unwrap();
        let root = CgroupRoot::from_mountinfo(&table);

        assert!(matches!(root.mountpoint(), Err(BurrowError::CgroupNotMounted)));
        std::fs::write(&table, MOUNTINFO).unwrap();
        assert!(matches!(root.mountpoint(), Err(BurrowError::CgroupNotMounted)));
    }

    #[test]
    fn mountpoint_is_resolved_once() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("mountinfo");
        std::fs::write(&table, MOUNTINFO).unwrap();
        let root = Arc::new(CgroupRoot::from_mountinfo(&table));
        assert_eq!(root.mountpoint().unwrap(), Path::new("/sys/fs/cgroup"));
        std::fs::remove_file(&table).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let root = Arc::clone(&root);
                std::thread::spawn(move || root.mountpoint().map(Path::to_path_buf).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), PathBuf::from("/sys/fs/cgroup"));
        }
    }

    #[test]
    fn set_writes_memory_limit_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let cg = CgroupController::new("burrow", Arc::new(CgroupRoot::fixed(dir.path())));
        let config = ResourceConfig {
            memory_limit: "100m".into(),
            ..ResourceConfig::default()
        };

        cg.set(&config).unwrap();
        let written = std::fs::read_to_string(dir.path().join("burrow/memory.max")).unwrap();
        assert_eq!(written, "100m");
    }

    #[test]
    fn set_leaves_unspecified_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let cg = CgroupController::new("burrow", Arc::new(CgroupRoot::fixed(dir.path())));

        cg.set(&ResourceConfig::default()).unwrap();
        assert!(dir.path().join("burrow").is_dir());
        assert!(!dir.path().join("burrow/memory.max").exists());
        assert!(!dir.path().join("burrow/cpu.weight").exists());
    }

    #[test]
    fn apply_twice_records_pid_once() {
        let dir = tempfile::tempdir().unwrap();
        let cg = CgroupController::new("burrow", Arc::new(CgroupRoot::fixed(dir.path())));

        cg.apply(1234).unwrap();
        cg.apply(1234).unwrap();
        let procs = std::fs::read_to_string(dir.path().join("burrow/cgroup.procs")).unwrap();
        assert_eq!(procs.lines().filter(|l| *l == "1234").count(), 1);
    }

    #[test]
    fn destroy_removes_empty_node() {
        let dir = tempfile::tempdir().unwrap();
        let cg = CgroupController::new("burrow", Arc::new(CgroupRoot::fixed(dir.path())));
        cg.set(&ResourceConfig::default()).unwrap();

        cg.destroy().unwrap();
        assert!(!dir.path().join("burrow").exists());
    }

    #[test]
    fn operations_fail_without_cgroup2() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("mountinfo");
        std::fs::write(&table, "").unwrap();
        let cg = CgroupController::new("burrow", Arc::new(CgroupRoot::from_mountinfo(&table)));

        assert!(matches!(cg.apply(1), Err(BurrowError::CgroupNotMounted)));
        assert!(matches!(
            cg.set(&ResourceConfig::default()),
            Err(BurrowError::CgroupNotMounted)
        ));
    }
}
