//! Domain primitive types used across the burrow workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{CONTAINER_ID_LEN, CREATED_TIME_FORMAT};
use crate::error::BurrowError;

/// Unique identifier for a container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random 10-character lowercase alphanumeric ID.
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;
        const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::rng();

        let id = (0..CONTAINER_ID_LEN)
            .map(|_| char::from(CHARSET[rng.random_range(0..CHARSET.len())]))
            .collect();
        Self(id)
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a container as persisted in its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// The init process is alive; `pid` is valid.
    Running,
    /// Stopped by an explicit `stop`.
    Stopped,
    /// The foreground process exited on its own.
    Exited,
}

impl ContainerStatus {
    /// Whether the container may be removed in this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Exited)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

impl FromStr for ContainerStatus {
    type Err = BurrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "exited" => Ok(Self::Exited),
            other => Err(BurrowError::Config {
                message: format!("unknown container status: {other}"),
            }),
        }
    }
}

/// Persisted metadata of one container, stored as `config.json`.
///
/// Field names match the on-disk JSON keys. `pid` is kept as a string so an
/// empty value can stand for "not running".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Host-visible PID of the init process, empty unless running.
    pub pid: String,
    /// Container identifier.
    pub id: ContainerId,
    /// Container name, the key of its metadata directory.
    pub name: String,
    /// Command line the container runs.
    pub command: String,
    /// Local creation time, `%Y-%m-%d %H:%M:%S`.
    pub created_time: String,
    /// Lifecycle state.
    pub status: ContainerStatus,
    /// Volume spec `hostPath:containerPath`, or empty.
    pub volume: String,
    /// Port mappings as given on the command line.
    #[serde(rename = "portmapping", default, deserialize_with = "null_as_empty")]
    pub port_mapping: Vec<String>,
}

impl ContainerRecord {
    /// Creates a running record stamped with the current local time.
    #[must_use]
    pub fn running(
        pid: impl Into<String>,
        id: ContainerId,
        name: impl Into<String>,
        command: impl Into<String>,
        volume: impl Into<String>,
        port_mapping: Vec<String>,
    ) -> Self {
        Self {
            pid: pid.into(),
            id,
            name: name.into(),
            command: command.into(),
            created_time: chrono::Local::now().format(CREATED_TIME_FORMAT).to_string(),
            status: ContainerStatus::Running,
            volume: volume.into(),
            port_mapping,
        }
    }

    /// Parses `pid` into a host PID, if present.
    #[must_use]
    pub fn host_pid(&self) -> Option<i32> {
        self.pid.trim().parse().ok()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Resource limits for the runtime's cgroup node.
///
/// Empty or `None` fields leave the kernel defaults untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Value for `memory.max`, e.g. `100m`; empty means unlimited.
    pub memory_limit: String,
    /// Relative CPU weight for `cpu.weight` (1-10000).
    pub cpu_weight: Option<u64>,
    /// CPU list for `cpuset.cpus`, e.g. `0-1`.
    pub cpu_set: Option<String>,
}

impl ResourceConfig {
    /// Whether any limit is requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memory_limit.is_empty() && self.cpu_weight.is_none() && self.cpu_set.is_none()
    }
}

/// Checks that `name` is usable as a single path component.
///
/// Container names are joined onto the info and overlay roots, so a name
/// containing `/` or equal to `.` or `..` would point outside them.
///
/// # Errors
///
/// Returns [`BurrowError::Config`] for an empty or path-like name.
pub fn validate_container_name(name: &str) -> Result<(), BurrowError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(BurrowError::Config {
            message: format!("invalid container name {name:?}"),
        });
    }
    Ok(())
}
