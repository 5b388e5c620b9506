//! Unified error type for the burrow workspace.
//!
//! Kernel-interface failures carry the operation that produced them so a
//! caller several layers up can still tell which syscall broke.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BurrowError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A system call failed.
    #[error("{op} failed: {source}")]
    Syscall {
        /// Human-readable description of the attempted operation.
        op: String,
        /// Errno reported by the kernel.
        source: nix::errno::Errno,
    },

    /// A configuration value or user input is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A persisted record exists but cannot be parsed.
    #[error("corrupt record at {path}: {source}")]
    Corrupt {
        /// Path of the unparseable file.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// The container is not in the state the operation requires.
    #[error("container {name} is {actual}, expected {expected}")]
    InvalidState {
        /// Container name.
        name: String,
        /// Required state(s).
        expected: &'static str,
        /// Observed state.
        actual: String,
    },

    /// No cgroup2 hierarchy is mounted on this host.
    #[error("cgroup2 hierarchy is not mounted")]
    CgroupNotMounted,

    /// The image archive could not be unpacked into the lower layer.
    #[error("image {image} could not be extracted into {path}")]
    ImageExtraction {
        /// Image name.
        image: String,
        /// Lower directory that ended up empty.
        path: PathBuf,
    },

    /// The external network collaborator rejected an attach request.
    #[error("network error: {message}")]
    Network {
        /// Description reported by the network collaborator.
        message: String,
    },

    /// Serialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl BurrowError {
    /// Wraps an errno with the operation that produced it.
    pub fn syscall(op: impl Into<String>, source: nix::errno::Errno) -> Self {
        Self::Syscall {
            op: op.into(),
            source,
        }
    }

    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BurrowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syscall_error_names_operation() {
        let err = BurrowError::syscall("pivot_root", nix::errno::Errno::EINVAL);
        assert!(err.to_string().starts_with("pivot_root failed"));
    }

    #[test]
    fn invalid_state_message_mentions_both_states() {
        let err = BurrowError::InvalidState {
            name: "web".into(),
            expected: "stopped",
            actual: "running".into(),
        };
        assert_eq!(err.to_string(), "container web is running, expected stopped");
    }
}
