//! Per-invocation runtime state.

use std::sync::Arc;

use burrow_common::config::RuntimePaths;
use burrow_common::constants::CGROUP_NAME;
use burrow_core::cgroup::{CgroupController, CgroupRoot};
use burrow_core::filesystem::mount::{Mounter, SyscallMounter};
use burrow_core::filesystem::overlayfs::OverlayFilesystemBuilder;
use burrow_image::store::ImageStore;

/// Paths plus the lazily resolved cgroup2 mountpoint.
///
/// Built once in `main` and passed down explicitly.
#[derive(Clone)]
pub struct RuntimeContext {
    paths: RuntimePaths,
    cgroup_root: Arc<CgroupRoot>,
    mounter: Arc<dyn Mounter>,
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("paths", &self.paths)
            .field("cgroup_root", &self.cgroup_root)
            .finish_non_exhaustive()
    }
}

impl RuntimeContext {
    /// Context for the host: kernel mounts, cgroup2 found via mountinfo.
    #[must_use]
    pub fn new(paths: RuntimePaths) -> Self {
        Self::with_parts(
            paths,
            Arc::new(CgroupRoot::from_mount_table()),
            Arc::new(SyscallMounter),
        )
    }

    /// Context with explicit collaborators.
    #[must_use]
    pub fn with_parts(
        paths: RuntimePaths,
        cgroup_root: Arc<CgroupRoot>,
        mounter: Arc<dyn Mounter>,
    ) -> Self {
        Self {
            paths,
            cgroup_root,
            mounter,
        }
    }

    /// On-disk layout.
    #[must_use]
    pub const fn paths(&self) -> &RuntimePaths {
        &self.paths
    }

    /// The image archive store.
    #[must_use]
    pub fn images(&self) -> ImageStore {
        ImageStore::new(&self.paths.image_root)
    }

    /// Overlay builder wired to the image store and mounter.
    #[must_use]
    pub fn filesystem(&self) -> OverlayFilesystemBuilder {
        OverlayFilesystemBuilder::new(
            &self.paths.overlay_root,
            Arc::new(self.images()),
            Arc::clone(&self.mounter),
        )
    }

    /// Handle to the runtime's cgroup node.
    #[must_use]
    pub fn cgroup(&self) -> CgroupController {
        CgroupController::new(CGROUP_NAME, Arc::clone(&self.cgroup_root))
    }
}
