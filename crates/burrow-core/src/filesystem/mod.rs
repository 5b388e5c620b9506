//! Filesystem management for container isolation.
//!
//! Provides the per-container `OverlayFS` workspace, volume bind mounts,
//! `pivot_root` for switching the root inside the child, and the mount
//! helpers init needs afterwards.

pub mod mount;
pub mod overlayfs;
pub mod pivot_root;
pub mod volume;
