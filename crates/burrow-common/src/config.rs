//! On-disk layout configuration for the burrow runtime.

use std::path::{Path, PathBuf};

use crate::constants;

/// The three host-singleton roots the runtime stores state under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Per-container metadata: `<info_root>/<name>/config.json`.
    pub info_root: PathBuf,
    /// Per-container layers: `<overlay_root>/<name>/{lower,upper,work,merged}`.
    pub overlay_root: PathBuf,
    /// Image archives: `<image_root>/<image>.tar`.
    pub image_root: PathBuf,
}

impl Default for RuntimePaths {
    fn default() -> Self {
        Self {
            info_root: PathBuf::from(constants::DEFAULT_INFO_ROOT),
            overlay_root: PathBuf::from(constants::DEFAULT_OVERLAY_ROOT),
            image_root: PathBuf::from(constants::DEFAULT_IMAGE_ROOT),
        }
    }
}

impl RuntimePaths {
    /// Places all three roots under a single base directory.
    #[must_use]
    pub fn under(base: &Path) -> Self {
        Self {
            info_root: base.join("run"),
            overlay_root: base.join("overlay2"),
            image_root: base.join("image"),
        }
    }

    /// Metadata directory for a container.
    #[must_use]
    pub fn container_info_dir(&self, name: &str) -> PathBuf {
        self.info_root.join(name)
    }

    /// Path of a container's `config.json`.
    #[must_use]
    pub fn config_file(&self, name: &str) -> PathBuf {
        self.container_info_dir(name).join(constants::CONFIG_FILE_NAME)
    }

    /// Path of a container's `container.log`.
    #[must_use]
    pub fn log_file(&self, name: &str) -> PathBuf {
        self.container_info_dir(name).join(constants::LOG_FILE_NAME)
    }
}
