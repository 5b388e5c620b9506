//! On-disk container registry.
//!
//! Each container owns `<info_root>/<name>/config.json`. The file is the
//! only record of a container's state; there is no daemon and no index.

use std::path::Path;

use burrow_common::config::RuntimePaths;
use burrow_common::error::{BurrowError, Result};
use burrow_common::types::{
    ContainerId, ContainerRecord, ContainerStatus, validate_container_name,
};
use burrow_core::filesystem::overlayfs::OverlayFilesystemBuilder;

/// File-per-container metadata store.
#[derive(Debug, Clone)]
pub struct ContainerRegistry {
    paths: RuntimePaths,
    filesystem: OverlayFilesystemBuilder,
}

impl ContainerRegistry {
    /// Creates a registry over `paths`; `filesystem` is used to tear down
    /// removed containers.
    #[must_use]
    pub const fn new(paths: RuntimePaths, filesystem: OverlayFilesystemBuilder) -> Self {
        Self { paths, filesystem }
    }

    /// Writes a running record for a freshly started container.
    ///
    /// An empty `name` falls back to the id.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a plain path component or the
    /// metadata directory or file cannot be written.
    pub fn record(
        &self,
        pid: i32,
        id: &ContainerId,
        name: &str,
        command: &str,
        volume: &str,
        ports: Vec<String>,
    ) -> Result<ContainerRecord> {
        let name = if name.is_empty() { id.as_str() } else { name };
        validate_container_name(name)?;
        let record = ContainerRecord::running(
            pid.to_string(),
            id.clone(),
            name,
            command,
            volume,
            ports,
        );
        self.save(&record)?;
        tracing::info!(%id, name, pid, "container recorded");
        Ok(record)
    }

    /// Loads the record of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::NotFound`] if no record exists and
    /// [`BurrowError::Corrupt`] if it cannot be parsed. A path-like name is
    /// rejected with [`BurrowError::Config`] before touching the disk.
    pub fn lookup(&self, name: &str) -> Result<ContainerRecord> {
        validate_container_name(name)?;
        let path = self.paths.config_file(name);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BurrowError::NotFound {
                    kind: "container",
                    id: name.to_string(),
                });
            }
            Err(e) => return Err(BurrowError::io(path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| BurrowError::Corrupt { path, source })
    }

    /// Rewrites the record of `name` with a new status and pid.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be loaded or written back.
    pub fn update_status(
        &self,
        name: &str,
        status: ContainerStatus,
        pid: &str,
    ) -> Result<ContainerRecord> {
        let mut record = self.lookup(name)?;
        record.status = status;
        record.pid = pid.to_string();
        self.save(&record)?;
        tracing::debug!(name, %status, "container status updated");
        Ok(record)
    }

    /// Lists every readable record, ordered by name.
    ///
    /// Directories without a parsable `config.json` are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the info root exists but cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        let root = &self.paths.info_root;
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BurrowError::io(root, e)),
        };

        let mut records = Vec::new();
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match self.lookup(&name) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(name, error = %e, "skipping unreadable container record"),
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// Deletes a stopped or exited container and its filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::InvalidState`] for a running container, or an
    /// error if the record cannot be loaded or its directory removed.
    pub fn remove(&self, name: &str) -> Result<()> {
        let record = self.lookup(name)?;
        if !record.status.is_terminal() {
            return Err(BurrowError::InvalidState {
                name: name.to_string(),
                expected: "stopped or exited",
                actual: record.status.to_string(),
            });
        }

        let dir = self.paths.container_info_dir(name);
        std::fs::remove_dir_all(&dir).map_err(|e| BurrowError::io(&dir, e))?;
        self.filesystem.teardown(name, &record.volume);
        tracing::info!(name, "container removed");
        Ok(())
    }

    /// Reads the container's log after checking it exists.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::NotFound`] for an unknown container.
    pub fn read_log(&self, name: &str) -> Result<Vec<u8>> {
        let _ = self.lookup(name)?;
        crate::logs::read_log(&self.paths, name)
    }

    fn save(&self, record: &ContainerRecord) -> Result<()> {
        let dir = self.paths.container_info_dir(&record.name);
        std::fs::create_dir_all(&dir).map_err(|e| BurrowError::io(&dir, e))?;
        let bytes = serde_json::to_vec(record)?;
        write_replacing(&self.paths.config_file(&record.name), &bytes)
    }
}

/// Writes through a sibling temp file and renames it over `path`, so a
/// reader never sees a half-written record.
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes).map_err(|e| BurrowError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| BurrowError::io(path, e))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use burrow_core::filesystem::mount::Mounter;
    use burrow_core::filesystem::overlayfs::ImageSource;

    use super::*;

    struct NoMounts;

    impl Mounter for NoMounts {
        fn mount_overlay(&self, _options: &str, _target: &Path) -> Result<()> {
            Ok(())
        }
        fn bind_mount(&self, _source: &Path, _target: &Path) -> Result<()> {
            Ok(())
        }
        fn unmount(&self, _target: &Path, _lazy: bool) -> Result<()> {
            Ok(())
        }
    }

    struct NoImages;

    impl ImageSource for NoImages {
        fn unpack(&self, _image: &str, _target: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn registry(base: &Path) -> ContainerRegistry {
        let paths = RuntimePaths::under(base);
        let fs = OverlayFilesystemBuilder::new(
            &paths.overlay_root,
            Arc::new(NoImages),
            Arc::new(NoMounts),
        );
        ContainerRegistry::new(paths, fs)
    }

    #[test]
    fn record_without_name_uses_id() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let id = ContainerId::new("ab12cd34ef");

        let record = reg.record(1234, &id, "", "top", "", Vec::new()).unwrap();
        assert_eq!(record.name, "ab12cd34ef");

        let raw = std::fs::read_to_string(dir.path().join("run/ab12cd34ef/config.json")).unwrap();
        assert!(raw.contains(r#""pid":"1234""#));
        assert!(raw.contains(r#""status":"running""#));
    }

    #[test]
    fn lookup_distinguishes_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        assert!(matches!(
            reg.lookup("ghost"),
            Err(BurrowError::NotFound { kind: "container", .. })
        ));

        std::fs::create_dir_all(dir.path().join("run/bad")).unwrap();
        std::fs::write(dir.path().join("run/bad/config.json"), "{not json").unwrap();
        assert!(matches!(reg.lookup("bad"), Err(BurrowError::Corrupt { .. })));
    }

    #[test]
    fn update_status_rewrites_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let id = ContainerId::new("0123456789");
        let _ = reg
            .record(77, &id, "web", "sleep 100", "/h:/c", vec!["80:80".into()])
            .unwrap();

        let updated = reg.update_status("web", ContainerStatus::Stopped, "").unwrap();
        assert_eq!(updated.pid, "");
        let reloaded = reg.lookup("web").unwrap();
        assert_eq!(reloaded.status, ContainerStatus::Stopped);
        assert_eq!(reloaded.volume, "/h:/c");
        assert_eq!(reloaded.port_mapping, vec!["80:80".to_string()]);
    }

    #[test]
    fn list_skips_unreadable_entries() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let _ = reg
            .record(1, &ContainerId::new("aaaaaaaaaa"), "b", "sh", "", Vec::new())
            .unwrap();
        let _ = reg
            .record(2, &ContainerId::new("bbbbbbbbbb"), "a", "sh", "", Vec::new())
            .unwrap();
        std::fs::create_dir_all(dir.path().join("run/empty")).unwrap();

        let names: Vec<_> = reg.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn list_without_info_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(registry(dir.path()).list().unwrap().is_empty());
    }

    #[test]
    fn remove_rejects_running_container() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let _ = reg
            .record(5, &ContainerId::new("cccccccccc"), "live", "sh", "", Vec::new())
            .unwrap();

        let err = reg.remove("live").unwrap_err();
        assert!(matches!(err, BurrowError::InvalidState { .. }));
        assert!(dir.path().join("run/live/config.json").exists());
    }

    #[test]
    fn remove_deletes_record_and_layers() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let _ = reg
            .record(5, &ContainerId::new("dddddddddd"), "done", "sh", "", Vec::new())
            .unwrap();
        let _ = reg.update_status("done", ContainerStatus::Exited, "").unwrap();
        let layers = dir.path().join("overlay2/done");
        for sub in ["lower/bin", "upper", "work", "merged"] {
            std::fs::create_dir_all(layers.join(sub)).unwrap();
        }

        reg.remove("done").unwrap();
        assert!(!dir.path().join("run/done").exists());
        assert!(layers.join("lower").exists());
        assert!(!layers.join("upper").exists());
        assert!(!layers.join("merged").exists());
    }

    #[test]
    fn read_log_requires_known_container() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        assert!(reg.read_log("nobody").is_err());
    }

    #[test]
    fn names_escaping_the_roots_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        std::fs::create_dir_all(dir.path().join("outside")).unwrap();

        let err = reg
            .record(9, &ContainerId::new("eeeeeeeeee"), "../outside", "sh", "", Vec::new())
            .unwrap_err();
        assert!(matches!(err, BurrowError::Config { .. }));
        assert!(matches!(reg.remove(".."), Err(BurrowError::Config { .. })));
        assert!(dir.path().join("outside").is_dir());
        assert!(!dir.path().join("config.json").exists());
    }
}
