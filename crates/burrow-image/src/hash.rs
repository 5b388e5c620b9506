//! SHA-256 content digests.

use std::path::Path;

use burrow_common::error::{BurrowError, Result};
use sha2::{Digest, Sha256};

/// Computes the SHA-256 digest of a file as `sha256:<hex>`.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<String> {
    tracing::debug!(path = %path.display(), "computing SHA-256 hash");
    let mut file = std::fs::File::open(path).map_err(|e| BurrowError::io(path, e))?;
    let mut hasher = Sha256::new();
    let _ = std::io::copy(&mut file, &mut hasher).map_err(|e| BurrowError::io(path, e))?;
    Ok(format!("sha256:{:x}", hasher.finalize()))
}
