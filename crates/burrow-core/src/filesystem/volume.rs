//! `hostPath:containerPath` volume specifications.

use std::path::{Path, PathBuf};

use burrow_common::error::{BurrowError, Result};

/// A parsed volume binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    /// Directory on the host, created if missing.
    pub host: PathBuf,
    /// Absolute-looking path inside the container root.
    pub container: PathBuf,
}

impl VolumeSpec {
    /// Parses a spec of exactly two non-empty colon-separated segments.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::Config`] for any other shape, e.g. `/host`,
    /// `/host:` or `a:b:c`.
    pub fn parse(raw: &str) -> Result<Self> {
        let segments: Vec<&str> = raw.split(':').collect();
        match segments.as_slice() {
            [host, container] if !host.is_empty() && !container.is_empty() => Ok(Self {
                host: PathBuf::from(host),
                container: PathBuf::from(container),
            }),
            _ => Err(BurrowError::Config {
                message: format!("volume must be hostPath:containerPath, got {raw:?}"),
            }),
        }
    }

    /// Parses an optional spec: empty input means "no volume", a malformed
    /// one is logged and also treated as "no volume".
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        match Self::parse(raw) {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::warn!(volume = raw, error = %e, "ignoring malformed volume");
                None
            }
        }
    }

    /// Location of the mount point under `merged`.
    ///
    /// The container path is appended textually so `/data` lands at
    /// `merged/data` rather than replacing `merged`.
    #[must_use]
    pub fn target_in(&self, merged: &Path) -> PathBuf {
        let relative = self
            .container
            .strip_prefix("/")
            .unwrap_or(&self.container);
        merged.join(relative)
    }
}
