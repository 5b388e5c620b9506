//! Mount utilities for container filesystem setup.
//!
//! [`Mounter`] is the seam the overlay builder mounts through, so the
//! directory bookkeeping can be exercised without `CAP_SYS_ADMIN`. The free
//! functions are used by init inside the new mount namespace.

use std::path::Path;

use burrow_common::error::{BurrowError, Result};
use nix::mount::{MntFlags, MsFlags, mount, umount2};

/// Mount operations needed to assemble and dismantle a container root.
pub trait Mounter: Send + Sync {
    /// Mounts an overlay filesystem with the given option string onto `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount is rejected.
    fn mount_overlay(&self, options: &str, target: &Path) -> Result<()>;

    /// Bind-mounts `source` onto `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount is rejected.
    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()>;

    /// Unmounts `target`. `lazy` detaches it even while busy.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount is rejected.
    fn unmount(&self, target: &Path, lazy: bool) -> Result<()>;
}

/// [`Mounter`] backed by `mount(2)` / `umount2(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyscallMounter;

impl Mounter for SyscallMounter {
    fn mount_overlay(&self, options: &str, target: &Path) -> Result<()> {
        mount(
            Some("overlay"),
            target,
            Some("overlay"),
            MsFlags::empty(),
            Some(options),
        )
        .map_err(|e| BurrowError::syscall(format!("overlay mount on {}", target.display()), e))?;
        tracing::info!(merged = %target.display(), "overlayfs mounted");
        Ok(())
    }

    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
        mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND,
            None::<&str>,
        )
        .map_err(|e| {
            BurrowError::syscall(
                format!("bind mount {} -> {}", source.display(), target.display()),
                e,
            )
        })?;
        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            "bind mount created"
        );
        Ok(())
    }

    fn unmount(&self, target: &Path, lazy: bool) -> Result<()> {
        let flags = if lazy {
            MntFlags::MNT_DETACH
        } else {
            MntFlags::empty()
        };
        umount2(target, flags)
            .map_err(|e| BurrowError::syscall(format!("unmount {}", target.display()), e))?;
        tracing::debug!(path = %target.display(), lazy, "unmounted");
        Ok(())
    }
}

/// Marks every mount under `/` private and recursive.
///
/// Must run before the child is cloned so its later mounts never
/// propagate back to the host's peer groups.
///
/// # Errors
///
/// Returns an error if the remount is rejected.
pub fn make_root_private() -> Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| BurrowError::syscall("remount / as private", e))?;
    tracing::debug!("root mount propagation set to private");
    Ok(())
}

/// Bind-mounts `root` onto itself so it becomes a mount point.
///
/// # Errors
///
/// Returns an error if the bind mount fails.
pub fn bind_onto_itself(root: &Path) -> Result<()> {
    mount(
        Some(root),
        root,
        Some("bind"),
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| BurrowError::syscall(format!("bind {} onto itself", root.display()), e))
}

/// Mounts a fresh procfs at `/proc` with no-exec, no-suid, and no-dev.
///
/// # Errors
///
/// Returns an error if the mount fails.
pub fn mount_proc() -> Result<()> {
    let flags = MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV;
    mount(Some("proc"), "/proc", Some("proc"), flags, None::<&str>)
        .map_err(|e| BurrowError::syscall("mount /proc", e))?;
    tracing::debug!("procfs mounted");
    Ok(())
}

/// Mounts a tmpfs at `/dev` with mode 0755.
///
/// # Errors
///
/// Returns an error if the mount fails.
pub fn mount_dev() -> Result<()> {
    mount(
        Some("tmpfs"),
        "/dev",
        Some("tmpfs"),
        MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME,
        Some("mode=755"),
    )
    .map_err(|e| BurrowError::syscall("mount /dev", e))?;
    tracing::debug!("tmpfs mounted on /dev");
    Ok(())
}

/// Lazily detaches whatever is mounted at `path`.
///
/// # Errors
///
/// Returns an error if `umount2(2)` fails.
pub fn detach(path: &Path) -> Result<()> {
    umount2(path, MntFlags::MNT_DETACH)
        .map_err(|e| BurrowError::syscall(format!("detach {}", path.display()), e))
}
