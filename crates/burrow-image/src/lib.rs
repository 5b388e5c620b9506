//! # burrow-image
//!
//! Image archive handling for the burrow runtime.
//!
//! Handles:
//! - **Store**: the `<image_root>/<image>.tar` layout and the
//!   [`ImageSource`](burrow_core::filesystem::overlayfs::ImageSource)
//!   implementation the overlay builder unpacks through.
//! - **Layers**: extracting plain or gzip tarballs, and packing a
//!   container's merged view back into an image.
//! - **Hashing**: SHA-256 digests of committed archives.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod hash;
pub mod layer;
pub mod store;
