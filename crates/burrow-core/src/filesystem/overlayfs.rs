//! `OverlayFS` workspace for a single container.
//!
//! Each container gets `<overlay_root>/<name>/{lower,upper,work,merged}`:
//! the extracted image as the read-only lower layer, a writable upper
//! layer, the overlay scratch directory, and the merged view that becomes
//! the container's root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use burrow_common::error::{BurrowError, Result};

use super::mount::Mounter;
use super::volume::VolumeSpec;

/// Something that can unpack a named image into a directory.
pub trait ImageSource: Send + Sync {
    /// Unpacks `image` into `target`, which already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is missing or cannot be unpacked.
    fn unpack(&self, image: &str, target: &Path) -> Result<()>;
}

/// The four layer directories of one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayLayers {
    /// `<overlay_root>/<name>`.
    pub root: PathBuf,
    /// Read-only extracted image.
    pub lower: PathBuf,
    /// Writable diff layer.
    pub upper: PathBuf,
    /// Overlay scratch directory.
    pub work: PathBuf,
    /// Union view, the child's future root.
    pub merged: PathBuf,
}

impl OverlayLayers {
    /// Computes the layer paths for a container.
    #[must_use]
    pub fn for_container(overlay_root: &Path, name: &str) -> Self {
        let root = overlay_root.join(name);
        Self {
            lower: root.join("lower"),
            upper: root.join("upper"),
            work: root.join("work"),
            merged: root.join("merged"),
            root,
        }
    }

    /// The `mount -o` option string for this container's overlay.
    #[must_use]
    pub fn mount_options(&self) -> String {
        format!(
            "lowerdir={},upperdir={},workdir={}",
            self.lower.display(),
            self.upper.display(),
            self.work.display()
        )
    }
}

/// Builds and dismantles per-container overlay workspaces.
#[derive(Clone)]
pub struct OverlayFilesystemBuilder {
    overlay_root: PathBuf,
    images: Arc<dyn ImageSource>,
    mounter: Arc<dyn Mounter>,
}

impl std::fmt::Debug for OverlayFilesystemBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayFilesystemBuilder")
            .field("overlay_root", &self.overlay_root)
            .finish_non_exhaustive()
    }
}

impl OverlayFilesystemBuilder {
    /// Creates a builder rooted at `overlay_root`.
    pub fn new(
        overlay_root: impl Into<PathBuf>,
        images: Arc<dyn ImageSource>,
        mounter: Arc<dyn Mounter>,
    ) -> Self {
        Self {
            overlay_root: overlay_root.into(),
            images,
            mounter,
        }
    }

    /// Layer paths for `name`.
    #[must_use]
    pub fn layers(&self, name: &str) -> OverlayLayers {
        OverlayLayers::for_container(&self.overlay_root, name)
    }

    /// Assembles the container's union filesystem and optional volume.
    ///
    /// The lower layer is only extracted when it is missing or empty, so a
    /// re-used container name skips the unpack. A malformed `volume` is
    /// logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be extracted, a layer directory
    /// cannot be created, or a mount fails. Layers created by this call are
    /// removed again before returning the error.
    pub fn build(&self, name: &str, image: &str, volume: &str) -> Result<OverlayLayers> {
        let layers = self.layers(name);
        self.create_lower(&layers, image)?;

        if let Err(e) = self.assemble(&layers, volume) {
            tracing::error!(name, error = %e, "overlay assembly failed, cleaning up");
            self.teardown(name, volume);
            return Err(e);
        }
        Ok(layers)
    }

    fn create_lower(&self, layers: &OverlayLayers, image: &str) -> Result<()> {
        if has_entries(&layers.lower) {
            tracing::debug!(lower = %layers.lower.display(), "lower layer already populated");
            return Ok(());
        }
        create_dir(&layers.lower)?;
        let extracted = self.images.unpack(image, &layers.lower).and_then(|()| {
            if has_entries(&layers.lower) {
                Ok(())
            } else {
                Err(BurrowError::ImageExtraction {
                    image: image.to_string(),
                    path: layers.lower.clone(),
                })
            }
        });
        if let Err(e) = extracted {
            // A partial lower would be reused as the cache by the next build.
            if let Err(rm) = std::fs::remove_dir_all(&layers.lower) {
                tracing::warn!(path = %layers.lower.display(), error = %rm, "failed to discard partial lower layer");
            }
            return Err(e);
        }
        tracing::info!(image, lower = %layers.lower.display(), "image extracted");
        Ok(())
    }

    fn assemble(&self, layers: &OverlayLayers, volume: &str) -> Result<()> {
        create_dir(&layers.upper)?;
        create_dir(&layers.work)?;
        create_dir(&layers.merged)?;
        self.mounter
            .mount_overlay(&layers.mount_options(), &layers.merged)?;

        if let Some(spec) = VolumeSpec::parse_lenient(volume) {
            self.mount_volume(layers, &spec)?;
        }
        Ok(())
    }

    fn mount_volume(&self, layers: &OverlayLayers, spec: &VolumeSpec) -> Result<()> {
        create_dir(&spec.host)?;
        let target = spec.target_in(&layers.merged);
        create_dir(&target)?;
        self.mounter.bind_mount(&spec.host, &target)?;
        tracing::info!(
            host = %spec.host.display(),
            container = %spec.container.display(),
            "volume mounted"
        );
        Ok(())
    }

    /// Dismantles the workspace built by [`build`](Self::build).
    ///
    /// Order: volume unmount, merged unmount, upper and work removal,
    /// merged removal. The lower layer is kept as the extracted image cache.
    /// Every failure is logged and skipped.
    pub fn teardown(&self, name: &str, volume: &str) {
        let layers = self.layers(name);

        if let Some(spec) = VolumeSpec::parse_lenient(volume) {
            let target = spec.target_in(&layers.merged);
            if let Err(e) = self.mounter.unmount(&target, false) {
                tracing::warn!(path = %target.display(), error = %e, "volume unmount failed");
            }
        }

        if let Err(e) = self.mounter.unmount(&layers.merged, true) {
            tracing::warn!(path = %layers.merged.display(), error = %e, "overlay unmount failed");
        }

        for dir in [&layers.upper, &layers.work] {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                tracing::warn!(path = %dir.display(), error = %e, "failed to remove layer");
            }
        }

        // Non-recursive: if the overlay is still attached this must fail
        // instead of deleting through the mount.
        if let Err(e) = std::fs::remove_dir(&layers.merged) {
            tracing::warn!(path = %layers.merged.display(), error = %e, "failed to remove merged dir");
        }
        tracing::info!(name, "container filesystem torn down");
    }
}

fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| BurrowError::io(path, e))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct RecordingMounter {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingMounter {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Mounter for RecordingMounter {
        fn mount_overlay(&self, options: &str, target: &Path) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("overlay {options} {}", target.display()));
            Ok(())
        }

        fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("bind {} {}", source.display(), target.display()));
            Ok(())
        }

        fn unmount(&self, target: &Path, _lazy: bool) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("umount {}", target.display()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeImage {
        unpacks: AtomicUsize,
        produce_nothing: bool,
        fail_after_first_entry: AtomicBool,
    }

    impl ImageSource for FakeImage {
        fn unpack(&self, _image: &str, target: &Path) -> Result<()> {
            let _ = self.unpacks.fetch_add(1, Ordering::SeqCst);
            if !self.produce_nothing {
                std::fs::write(target.join("bin"), b"busybox").unwrap();
            }
            if self.fail_after_first_entry.swap(false, Ordering::SeqCst) {
                return Err(BurrowError::io(
                    target,
                    std::io::Error::other("disk full mid-extract"),
                ));
            }
            Ok(())
        }
    }

    fn builder(
        root: &Path,
        image: Arc<FakeImage>,
    ) -> (OverlayFilesystemBuilder, Arc<RecordingMounter>) {
        let mounter = Arc::new(RecordingMounter::default());
        let builder = OverlayFilesystemBuilder::new(root, image, mounter.clone());
        (builder, mounter)
    }

    #[test]
    fn build_creates_layers_and_mounts_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let (fs, mounter) = builder(dir.path(), Arc::new(FakeImage::default()));

        let layers = fs.build("c1", "busybox", "").unwrap();
        assert!(layers.lower.join("bin").exists());
        assert!(layers.upper.is_dir());
        assert!(layers.work.is_dir());
        assert!(layers.merged.is_dir());

        let calls = mounter.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("overlay lowerdir="));
        assert!(calls[0].ends_with("merged"));
    }

    #[test]
    fn lower_is_extracted_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let image = Arc::new(FakeImage::default());
        let (fs, _) = builder(dir.path(), image.clone());

        let _ = fs.build("c1", "busybox", "").unwrap();
        fs.teardown("c1", "");
        let _ = fs.build("c1", "busybox", "").unwrap();
        assert_eq!(image.unpacks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_extraction_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let image = Arc::new(FakeImage {
            produce_nothing: true,
            ..FakeImage::default()
        });
        let (fs, mounter) = builder(dir.path(), image);

        let err = fs.build("c1", "missing", "").unwrap_err();
        assert!(matches!(err, BurrowError::ImageExtraction { .. }));
        assert!(mounter.calls().is_empty());
    }

    #[test]
    fn failed_extraction_is_not_reused_as_cache() {
        let dir = tempfile::tempdir().unwrap();
        let image = Arc::new(FakeImage {
            fail_after_first_entry: AtomicBool::new(true),
            ..FakeImage::default()
        });
        let (fs, mounter) = builder(dir.path(), image.clone());

        assert!(fs.build("c1", "busybox", "").is_err());
        assert!(!fs.layers("c1").lower.exists());
        assert!(mounter.calls().is_empty());

        let layers = fs.build("c1", "busybox", "").unwrap();
        assert_eq!(image.unpacks.load(Ordering::SeqCst), 2);
        assert!(layers.lower.join("bin").exists());
    }

    #[test]
    fn empty_extraction_leaves_no_lower_behind() {
        let dir = tempfile::tempdir().unwrap();
        let image = Arc::new(FakeImage {
            produce_nothing: true,
            ..FakeImage::default()
        });
        let (fs, _) = builder(dir.path(), image);

        assert!(fs.build("c1", "missing", "").is_err());
        assert!(!fs.layers("c1").lower.exists());
    }

    #[test]
    fn well_formed_volume_is_bind_mounted() {
        let dir = tempfile::tempdir().unwrap();
        let (fs, mounter) = builder(dir.path(), Arc::new(FakeImage::default()));
        let host = dir.path().join("host");
        let spec = format!("{}:/data", host.display());

        let layers = fs.build("c1", "busybox", &spec).unwrap();
        assert!(host.is_dir());
        assert!(layers.merged.join("data").is_dir());
        assert!(mounter.calls().iter().any(|c| c.starts_with("bind ")));
    }

    #[test]
    fn malformed_volume_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (fs, mounter) = builder(dir.path(), Arc::new(FakeImage::default()));

        for spec in ["/host", "/host:"] {
            let _ = fs.build("c1", "busybox", spec).unwrap();
            assert!(!mounter.calls().iter().any(|c| c.starts_with("bind ")));
            fs.teardown("c1", spec);
        }
    }

    #[test]
    fn teardown_leaves_only_the_image_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (fs, _) = builder(dir.path(), Arc::new(FakeImage::default()));

        let layers = fs.build("fresh", "busybox", "").unwrap();
        fs.teardown("fresh", "");

        let remaining: Vec<_> = std::fs::read_dir(&layers.root)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(remaining, vec![std::ffi::OsString::from("lower")]);
    }

    #[test]
    fn volume_is_unmounted_before_merged() {
        let dir = tempfile::tempdir().unwrap();
        let (fs, mounter) = builder(dir.path(), Arc::new(FakeImage::default()));
        let spec = format!("{}:/data", dir.path().join("host").display());

        let _ = fs.build("c1", "busybox", &spec).unwrap();
        fs.teardown("c1", &spec);

        let calls = mounter.calls();
        let volume_umount = calls
            .iter()
            .position(|c| c.starts_with("umount") && c.ends_with("merged/data"))
            .unwrap();
        let merged_umount = calls
            .iter()
            .position(|c| c.starts_with("umount") && c.ends_with("merged"))
            .unwrap();
        assert!(volume_umount < merged_umount);
    }
}
