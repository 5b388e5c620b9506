//! Linux namespace management for container isolation.
//!
//! New containers are cloned into fresh UTS, IPC, PID, mount, and network
//! namespaces. A user namespace is never requested: the runtime requires
//! root and does not remap IDs.

pub mod join;

use nix::sched::CloneFlags;

/// Which namespaces a new container gets.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Isolate hostname and domain name.
    pub uts: bool,
    /// Isolate System V IPC and POSIX message queues.
    pub ipc: bool,
    /// Isolate the PID space; the child becomes PID 1.
    pub pid: bool,
    /// Isolate the mount table.
    pub mount: bool,
    /// Isolate the network stack.
    pub network: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            uts: true,
            ipc: true,
            pid: true,
            mount: true,
            network: true,
        }
    }
}

impl NamespaceConfig {
    /// Converts to `clone(2)` flags.
    #[must_use]
    pub fn to_clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();
        if self.uts {
            flags |= CloneFlags::CLONE_NEWUTS;
        }
        if self.ipc {
            flags |= CloneFlags::CLONE_NEWIPC;
        }
        if self.pid {
            flags |= CloneFlags::CLONE_NEWPID;
        }
        if self.mount {
            flags |= CloneFlags::CLONE_NEWNS;
        }
        if self.network {
            flags |= CloneFlags::CLONE_NEWNET;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_requests_five_namespaces_without_user() {
        let flags = NamespaceConfig::default().to_clone_flags();
        assert!(flags.contains(
            CloneFlags::CLONE_NEWUTS
                | CloneFlags::CLONE_NEWIPC
                | CloneFlags::CLONE_NEWPID
                | CloneFlags::CLONE_NEWNS
                | CloneFlags::CLONE_NEWNET
        ));
        assert!(!flags.contains(CloneFlags::CLONE_NEWUSER));
    }

    #[test]
    fn disabled_namespaces_are_omitted() {
        let config = NamespaceConfig {
            network: false,
            ..NamespaceConfig::default()
        };
        assert!(!config.to_clone_flags().contains(CloneFlags::CLONE_NEWNET));
    }
}
