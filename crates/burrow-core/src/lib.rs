//! # burrow-core
//!
//! Low-level Linux isolation primitives for the burrow runtime.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: clone flags for new containers and `setns(2)` entry
//!   into a running one.
//! - **Cgroups v2**: mountpoint discovery, memory/CPU limits, membership.
//! - **Filesystem**: the four-layer `OverlayFS` workspace, volume bind
//!   mounts, and `pivot_root`.
//!
//! Every kernel call goes through `nix`; failures carry the operation name
//! in [`BurrowError::Syscall`](burrow_common::error::BurrowError::Syscall).

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

#[cfg(not(target_os = "linux"))]
compile_error!("burrow-core requires Linux (namespaces, cgroup2, overlayfs)");

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
