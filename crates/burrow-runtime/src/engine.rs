//! Runtime engine that orchestrates container lifecycle.

use std::sync::Arc;

use burrow_common::error::{BurrowError, Result};
use burrow_common::types::{
    ContainerId, ContainerRecord, ContainerStatus, ResourceConfig, validate_container_name,
};
use burrow_image::store::PackedImage;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::context::RuntimeContext;
use crate::network::NetworkAttacher;
use crate::process::{
    CommandPipe, ContainerProcess, NewContainerOptions, ProcessOrchestrator, join_command,
};
use crate::registry::ContainerRegistry;

/// Everything `run` needs to start a container.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Attach to the terminal and wait; otherwise run detached.
    pub tty: bool,
    /// Container name; a generated id is used when empty.
    pub name: String,
    /// Image archive name.
    pub image: String,
    /// Command and arguments to run inside the container.
    pub command: Vec<String>,
    /// Volume spec `hostPath:containerPath`, or empty.
    pub volume: String,
    /// Limits for the runtime's cgroup node.
    pub resources: ResourceConfig,
    /// Extra `KEY=VALUE` environment entries.
    pub env: Vec<String>,
    /// Network to attach to, if any.
    pub network: Option<String>,
    /// Port mappings handed to the network attacher.
    pub ports: Vec<String>,
}

/// How `run` finished.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Foreground container ran to completion.
    Exited {
        /// Final record, status `exited`.
        record: ContainerRecord,
        /// Exit code of the container's process.
        code: i32,
    },
    /// Detached container left running.
    Detached(ContainerRecord),
}

/// The runtime engine that coordinates all container operations.
pub struct Engine {
    ctx: RuntimeContext,
    registry: ContainerRegistry,
    network: Option<Arc<dyn NetworkAttacher>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("ctx", &self.ctx)
            .field("network", &self.network.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine over `ctx` without a network backend.
    #[must_use]
    pub fn new(ctx: RuntimeContext) -> Self {
        let registry = ContainerRegistry::new(ctx.paths().clone(), ctx.filesystem());
        Self {
            ctx,
            registry,
            network: None,
        }
    }

    /// Installs the collaborator used for `--net`.
    #[must_use]
    pub fn with_network(mut self, attacher: Arc<dyn NetworkAttacher>) -> Self {
        self.network = Some(attacher);
        self
    }

    /// The container registry.
    #[must_use]
    pub const fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }

    /// Creates and starts a container.
    ///
    /// A foreground container is waited for, marked exited and its
    /// filesystem torn down. A detached container is left running.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is empty, the name is taken or is
    /// not a plain path component, or any step of creation fails. A failure after the process started kills
    /// it and removes everything created for it.
    pub fn run(&self, request: &RunRequest) -> Result<RunOutcome> {
        if request.command.is_empty() {
            return Err(BurrowError::Config {
                message: "no command given".into(),
            });
        }
        let id = ContainerId::generate();
        let name = if request.name.is_empty() {
            id.to_string()
        } else {
            request.name.clone()
        };
        validate_container_name(&name)?;
        if self.ctx.paths().config_file(&name).exists() {
            return Err(BurrowError::Config {
                message: format!("container name {name} is already in use"),
            });
        }

        let orchestrator = ProcessOrchestrator::new(&self.ctx);
        let (mut process, pipe) = orchestrator.new_container(&NewContainerOptions {
            tty: request.tty,
            volume: request.volume.clone(),
            name: name.clone(),
            image: request.image.clone(),
            env: request.env.clone(),
        })?;

        let pid = match process.start() {
            Ok(pid) => pid,
            Err(e) => {
                self.discard(&process);
                return Err(e);
            }
        };

        let record = match self.configure(&process, pipe, pid, &id, request) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(name = %name, error = %e, "container setup failed, cleaning up");
                process.kill_and_reap();
                self.discard(&process);
                return Err(e);
            }
        };

        if !request.tty {
            tracing::info!(name = %name, pid = pid.as_raw(), "container running detached");
            return Ok(RunOutcome::Detached(record));
        }

        let waited = process.wait();
        let updated = self
            .registry
            .update_status(&name, ContainerStatus::Exited, "");
        self.ctx.filesystem().teardown(&name, &request.volume);
        let code = waited?;
        tracing::info!(name = %name, code, "container exited");
        Ok(RunOutcome::Exited {
            record: updated?,
            code,
        })
    }

    /// Post-start steps: record, limits, network, then release init.
    fn configure(
        &self,
        process: &ContainerProcess,
        pipe: CommandPipe,
        pid: Pid,
        id: &ContainerId,
        request: &RunRequest,
    ) -> Result<ContainerRecord> {
        let record = self.registry.record(
            pid.as_raw(),
            id,
            process.name(),
            &join_command(&request.command),
            &request.volume,
            request.ports.clone(),
        )?;

        if !request.resources.is_empty() {
            let cgroup = self.ctx.cgroup();
            cgroup.set(&request.resources)?;
            cgroup.apply(pid.as_raw())?;
        }

        if let Some(network) = &request.network {
            let attacher = self.network.as_ref().ok_or_else(|| BurrowError::Network {
                message: format!("no network backend configured for {network}"),
            })?;
            attacher.attach(network, &record)?;
        }

        pipe.send(&request.command)?;
        Ok(record)
    }

    fn discard(&self, process: &ContainerProcess) {
        self.ctx
            .filesystem()
            .teardown(process.name(), process.volume());
        let dir = self.ctx.paths().container_info_dir(process.name());
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                tracing::warn!(path = %dir.display(), error = %e, "failed to remove metadata dir");
            }
        }
    }

    /// Sends SIGTERM to a running container and marks it stopped.
    ///
    /// A process that is already gone is still marked stopped.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::InvalidState`] if the container is not
    /// running, or an error if the signal or record update fails.
    pub fn stop(&self, name: &str) -> Result<ContainerRecord> {
        let record = self.registry.lookup(name)?;
        let pid = running_pid(&record)?;

        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => tracing::info!(name, pid, "sent SIGTERM"),
            Err(Errno::ESRCH) => tracing::warn!(name, pid, "process already gone"),
            Err(e) => return Err(BurrowError::syscall(format!("kill {pid}"), e)),
        }
        self.registry
            .update_status(name, ContainerStatus::Stopped, "")
    }

    /// Removes a stopped or exited container.
    ///
    /// # Errors
    ///
    /// See [`ContainerRegistry::remove`].
    pub fn remove(&self, name: &str) -> Result<()> {
        self.registry.remove(name)
    }

    /// Lists all containers.
    ///
    /// # Errors
    ///
    /// Returns an error if the info root cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        self.registry.list()
    }

    /// Returns the raw log bytes of a detached container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown or the log unreadable.
    pub fn logs(&self, name: &str) -> Result<Vec<u8>> {
        self.registry.read_log(name)
    }

    /// Packs the container's merged root into `<image_root>/<image>.tar`.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown, its root is gone, or
    /// the archive cannot be written.
    pub fn commit(&self, name: &str, image: &str) -> Result<PackedImage> {
        let _ = self.registry.lookup(name)?;
        let layers = self.ctx.filesystem().layers(name);
        self.ctx.images().commit(&layers.merged, image)
    }

    /// Runs `argv` inside a running container and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::InvalidState`] if the container is not
    /// running, or an error if the helper cannot be launched.
    pub fn exec(&self, name: &str, argv: &[String]) -> Result<i32> {
        let record = self.registry.lookup(name)?;
        let pid = running_pid(&record)?;
        crate::exec::exec_in_container(pid, argv)
    }
}

fn running_pid(record: &ContainerRecord) -> Result<i32> {
    match (record.status, record.host_pid()) {
        (ContainerStatus::Running, Some(pid)) => Ok(pid),
        (status, _) => Err(BurrowError::InvalidState {
            name: record.name.clone(),
            expected: "running",
            actual: status.to_string(),
        }),
    }
}
