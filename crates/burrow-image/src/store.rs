//! Local image store: a flat directory of `<image>.tar` archives.

use std::path::{Path, PathBuf};

use burrow_common::error::{BurrowError, Result};
use burrow_core::filesystem::overlayfs::ImageSource;

use crate::{hash, layer};

/// Result of committing a container root into an image archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedImage {
    /// Archive written.
    pub path: PathBuf,
    /// `sha256:<hex>` digest of the archive.
    pub digest: String,
    /// Archive size on disk.
    pub size_bytes: u64,
}

/// Image archives stored under one directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the archive for `image`.
    #[must_use]
    pub fn archive_path(&self, image: &str) -> PathBuf {
        self.root.join(format!("{image}.tar"))
    }

    /// Packs a container's merged root into `<root>/<image>.tar`.
    ///
    /// An existing archive of the same name is overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the source directory is missing or the archive
    /// cannot be written.
    pub fn commit(&self, merged: &Path, image: &str) -> Result<PackedImage> {
        if !merged.is_dir() {
            return Err(BurrowError::NotFound {
                kind: "container filesystem",
                id: merged.display().to_string(),
            });
        }
        let path = self.archive_path(image);
        layer::pack_directory(merged, &path)?;

        let digest = hash::hash_file(&path)?;
        let size_bytes = std::fs::metadata(&path)
            .map_err(|e| BurrowError::io(&path, e))?
            .len();
        tracing::info!(image, path = %path.display(), %digest, size_bytes, "image committed");
        Ok(PackedImage {
            path,
            digest,
            size_bytes,
        })
    }
}

impl ImageSource for ImageStore {
    fn unpack(&self, image: &str, target: &Path) -> Result<()> {
        let archive = self.archive_path(image);
        if !archive.is_file() {
            return Err(BurrowError::NotFound {
                kind: "image",
                id: image.to_string(),
            });
        }
        layer::unpack_archive(&archive, target)
    }
}
