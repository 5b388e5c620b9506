//! Secure root filesystem switching via `pivot_root(2)`.
//!
//! More secure than `chroot` because it actually changes the root mount
//! point rather than just the process's view of `/`.

use std::path::Path;

use burrow_common::error::{BurrowError, Result};
use nix::unistd::chdir;

use super::mount::{bind_onto_itself, detach};

/// Scratch directory under the new root that briefly holds the old root.
pub const OLD_ROOT_DIR: &str = ".pivot_root";

/// Makes `new_root` the process's `/` and discards the old root.
///
/// `new_root` is bind-mounted onto itself first because `pivot_root(2)`
/// requires the new root to be a mount point. The old root is lazily
/// detached and its scratch directory removed, leaving the host
/// filesystem unreachable.
///
/// Only meaningful inside a private mount namespace.
///
/// # Errors
///
/// Returns an error if any mount, `pivot_root(2)`, `chdir(2)`, or the
/// scratch directory handling fails.
pub fn pivot_root(new_root: &Path) -> Result<()> {
    tracing::info!(new_root = %new_root.display(), "performing pivot_root");

    bind_onto_itself(new_root)?;

    let put_old = new_root.join(OLD_ROOT_DIR);
    std::fs::create_dir_all(&put_old).map_err(|e| BurrowError::io(&put_old, e))?;

    nix::unistd::pivot_root(new_root, &put_old)
        .map_err(|e| BurrowError::syscall("pivot_root", e))?;
    chdir("/").map_err(|e| BurrowError::syscall("chdir /", e))?;

    let old_root = Path::new("/").join(OLD_ROOT_DIR);
    detach(&old_root)?;
    std::fs::remove_dir(&old_root).map_err(|e| BurrowError::io(&old_root, e))?;

    tracing::debug!("old root detached");
    Ok(())
}
