//! # burrow-runtime
//!
//! Container lifecycle for the burrow runtime: the orchestrating parent,
//! the init trampoline that runs inside the new namespaces, the on-disk
//! registry, and `exec` into a running container.
//!
//! The binary is re-executed in three roles, see [`entry::EntryMode`].

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod context;
pub mod engine;
pub mod entry;
pub mod exec;
pub mod init;
pub mod logs;
pub mod network;
pub mod process;
pub mod registry;
