//! Network attachment seam.
//!
//! Bridge, veth and port-forwarding setup live outside the runtime. The
//! engine only asks an attacher to connect a started container and treats
//! the answer as success or failure.

use burrow_common::error::Result;
use burrow_common::types::ContainerRecord;

/// Connects a running container to a named network.
pub trait NetworkAttacher: Send + Sync {
    /// Attaches `record`'s process to `network`, applying its port mappings.
    ///
    /// # Errors
    ///
    /// Returns [`burrow_common::error::BurrowError::Network`] if the
    /// attachment cannot be made.
    fn attach(&self, network: &str, record: &ContainerRecord) -> Result<()>;
}
