//! Spawning the container's init process.
//!
//! The parent prepares everything the child needs (pipe, log file, overlay
//! root, C strings for `execve`) before calling `clone(2)`, so the child
//! only has to rearrange file descriptors, `chdir` into the merged root and
//! re-execute this binary as `init`.

use std::ffi::{CString, OsString};
use std::fs::File;
use std::io::Write;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use burrow_common::config::RuntimePaths;
use burrow_common::constants::{COMMAND_PIPE_FD, INIT_SUBCOMMAND};
use burrow_common::error::{BurrowError, Result};
use burrow_core::filesystem::mount::make_root_private;
use burrow_core::filesystem::overlayfs::OverlayFilesystemBuilder;
use burrow_core::namespace::NamespaceConfig;
use nix::fcntl::OFlag;
use nix::sched::{CloneFlags, clone};
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Pid, pipe2};

use crate::context::RuntimeContext;
use crate::logs;

/// Path the child re-executes to become `init`.
pub const SELF_EXE: &str = "/proc/self/exe";

/// Stack for the cloned child. It only runs until `execve`.
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Parameters of a new container process.
#[derive(Debug, Clone, Default)]
pub struct NewContainerOptions {
    /// Foreground: inherit the terminal instead of writing a log file.
    pub tty: bool,
    /// Volume spec `hostPath:containerPath`, or empty.
    pub volume: String,
    /// Container name; keys the metadata and layer directories.
    pub name: String,
    /// Image archive name under the image root.
    pub image: String,
    /// Extra `KEY=VALUE` entries layered over the inherited environment.
    pub env: Vec<String>,
}

/// Builds container processes and their filesystems.
#[derive(Debug, Clone)]
pub struct ProcessOrchestrator {
    paths: RuntimePaths,
    filesystem: OverlayFilesystemBuilder,
    namespaces: NamespaceConfig,
}

impl ProcessOrchestrator {
    /// Creates an orchestrator using the context's paths and filesystem.
    #[must_use]
    pub fn new(ctx: &RuntimeContext) -> Self {
        Self {
            paths: ctx.paths().clone(),
            filesystem: ctx.filesystem(),
            namespaces: NamespaceConfig::default(),
        }
    }

    /// Prepares a container process without starting it.
    ///
    /// Allocates the command pipe, opens the log file for detached
    /// containers and assembles the overlay root. Nothing is left behind
    /// on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipe, log file or filesystem cannot be
    /// created, or an environment entry is malformed.
    pub fn new_container(
        &self,
        options: &NewContainerOptions,
    ) -> Result<(ContainerProcess, CommandPipe)> {
        let (reader, writer) =
            pipe2(OFlag::O_CLOEXEC).map_err(|e| BurrowError::syscall("pipe2", e))?;
        make_root_private()?;

        let log = if options.tty {
            None
        } else {
            Some(logs::create_log(&self.paths, &options.name)?)
        };

        let prepared = self
            .filesystem
            .build(&options.name, &options.image, &options.volume)
            .and_then(|layers| {
                let launch = ChildLaunch::prepare(&layers.merged, &options.env)
                    .inspect_err(|_| self.filesystem.teardown(&options.name, &options.volume))?;
                Ok((layers, launch))
            });
        let (layers, launch) = match prepared {
            Ok(parts) => parts,
            Err(e) => {
                if log.is_some() {
                    self.discard_info_dir(&options.name);
                }
                return Err(e);
            }
        };

        tracing::debug!(name = %options.name, merged = %layers.merged.display(), "container prepared");
        let process = ContainerProcess {
            name: options.name.clone(),
            volume: options.volume.clone(),
            launch,
            command_reader: Some(reader),
            log,
            clone_flags: self.namespaces.to_clone_flags(),
            pid: None,
        };
        Ok((process, CommandPipe::new(writer)))
    }

    fn discard_info_dir(&self, name: &str) {
        let dir = self.paths.container_info_dir(name);
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            tracing::warn!(path = %dir.display(), error = %e, "failed to remove metadata dir");
        }
    }
}

/// Everything `execve` needs, converted before `clone(2)`.
#[derive(Debug)]
struct ChildLaunch {
    exe: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
    cwd: CString,
}

impl ChildLaunch {
    fn prepare(merged: &Path, extra_env: &[String]) -> Result<Self> {
        let env = merge_env(std::env::vars_os().collect(), extra_env)?;
        let envp = env
            .into_iter()
            .map(|(key, value)| {
                let mut entry = key;
                entry.push("=");
                entry.push(value);
                c_string(entry.as_bytes())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            exe: c_string(SELF_EXE.as_bytes())?,
            argv: vec![
                c_string(SELF_EXE.as_bytes())?,
                c_string(INIT_SUBCOMMAND.as_bytes())?,
            ],
            envp,
            cwd: c_string(merged.as_os_str().as_bytes())?,
        })
    }
}

fn c_string(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|_| BurrowError::Config {
        message: format!(
            "value contains a NUL byte: {}",
            String::from_utf8_lossy(bytes)
        ),
    })
}

/// Layers `KEY=VALUE` entries over `base`, replacing keys that exist.
///
/// # Errors
///
/// Returns [`BurrowError::Config`] for an entry without `=`.
pub fn merge_env(
    mut base: Vec<(OsString, OsString)>,
    extra: &[String],
) -> Result<Vec<(OsString, OsString)>> {
    for entry in extra {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(BurrowError::Config {
                message: format!("environment entry must be KEY=VALUE, got {entry:?}"),
            });
        };
        if let Some((_, existing)) = base.iter_mut().find(|(k, _)| k == key) {
            *existing = value.into();
        } else {
            base.push((key.into(), value.into()));
        }
    }
    Ok(base)
}

/// A prepared, and later running, container init process.
#[derive(Debug)]
pub struct ContainerProcess {
    name: String,
    volume: String,
    launch: ChildLaunch,
    command_reader: Option<OwnedFd>,
    log: Option<File>,
    clone_flags: CloneFlags,
    pid: Option<Pid>,
}

impl ContainerProcess {
    /// Container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Volume spec the filesystem was built with.
    #[must_use]
    pub fn volume(&self) -> &str {
        &self.volume
    }

    /// Clones the child into new namespaces and returns its host PID.
    ///
    /// Returns as soon as the child exists; it blocks in `init` until the
    /// command pipe is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the process was already started or `clone(2)`
    /// fails.
    pub fn start(&mut self) -> Result<Pid> {
        let Some(reader) = self.command_reader.take() else {
            return Err(BurrowError::InvalidState {
                name: self.name.clone(),
                expected: "prepared",
                actual: "started".into(),
            });
        };
        let log_fd = self.log.as_ref().map(AsRawFd::as_raw_fd);
        let reader_fd = reader.as_raw_fd();
        let launch = &self.launch;
        let argv = null_terminated(&launch.argv);
        let envp = null_terminated(&launch.envp);

        let mut stack = vec![0u8; CHILD_STACK_SIZE];
        let child = Box::new(|| -> isize {
            // SAFETY: runs in the freshly cloned child, which owns copies of
            // every descriptor and buffer captured here and only calls
            // async-signal-safe functions before execve.
            unsafe { exec_init(reader_fd, log_fd, launch, &argv, &envp) }
        });

        // SAFETY: the child gets its own copy of the address space (no
        // CLONE_VM), so the stack and captured references stay valid.
        let pid = unsafe {
            clone(
                child,
                &mut stack,
                self.clone_flags,
                Some(Signal::SIGCHLD as libc::c_int),
            )
        }
        .map_err(|e| BurrowError::syscall("clone", e))?;

        drop(reader);
        self.log = None;
        self.pid = Some(pid);
        tracing::info!(name = %self.name, pid = pid.as_raw(), "container process started");
        Ok(pid)
    }

    /// Blocks until the child exits and returns its exit code.
    ///
    /// A child killed by a signal reports `128 + signo`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process was never started or `waitpid`
    /// fails.
    pub fn wait(&self) -> Result<i32> {
        let pid = self.started_pid()?;
        loop {
            match waitpid(pid, None).map_err(|e| BurrowError::syscall("waitpid", e))? {
                WaitStatus::Exited(_, code) => return Ok(code),
                WaitStatus::Signaled(_, signal, _) => return Ok(128 + signal as i32),
                _ => {}
            }
        }
    }

    /// Kills and reaps the child. Used when a step after `start` fails.
    pub fn kill_and_reap(&self) {
        let Some(pid) = self.pid else {
            return;
        };
        if let Err(e) = kill(pid, Signal::SIGKILL) {
            tracing::warn!(pid = pid.as_raw(), error = %e, "failed to kill container process");
            return;
        }
        if let Err(e) = waitpid(pid, None) {
            tracing::warn!(pid = pid.as_raw(), error = %e, "failed to reap container process");
        }
    }

    fn started_pid(&self) -> Result<Pid> {
        self.pid.ok_or_else(|| BurrowError::InvalidState {
            name: self.name.clone(),
            expected: "started",
            actual: "prepared".into(),
        })
    }
}

fn null_terminated(strings: &[CString]) -> Vec<*const libc::c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

/// Child side of `clone(2)`: wire up descriptors and become `init`.
///
/// Only returns if something failed; the return value is the exit code.
unsafe fn exec_init(
    reader_fd: RawFd,
    log_fd: Option<RawFd>,
    launch: &ChildLaunch,
    argv: &[*const libc::c_char],
    envp: &[*const libc::c_char],
) -> isize {
    // SAFETY: plain descriptor and exec syscalls on values owned by this
    // process; pointers come from live CStrings.
    unsafe {
        // Rust ignores SIGPIPE at startup and ignored dispositions survive
        // execve.
        let _ = libc::signal(libc::SIGPIPE, libc::SIG_DFL);

        if let Some(fd) = log_fd {
            if libc::dup2(fd, libc::STDOUT_FILENO) < 0 || libc::dup2(fd, libc::STDERR_FILENO) < 0 {
                return 1;
            }
        }

        // dup2 clears FD_CLOEXEC on the new descriptor; when the pipe is
        // already fd 3 the flag has to be cleared by hand.
        if reader_fd == COMMAND_PIPE_FD {
            let flags = libc::fcntl(reader_fd, libc::F_GETFD);
            if flags < 0 || libc::fcntl(reader_fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0 {
                return 1;
            }
        } else if libc::dup2(reader_fd, COMMAND_PIPE_FD) < 0 {
            return 1;
        }

        if libc::chdir(launch.cwd.as_ptr()) != 0 {
            return 1;
        }
        let _ = libc::execve(launch.exe.as_ptr(), argv.as_ptr(), envp.as_ptr());
    }
    127
}

/// Write end of the parent-to-init command pipe.
#[derive(Debug)]
pub struct CommandPipe {
    writer: File,
}

impl CommandPipe {
    /// Wraps the write end of a pipe.
    #[must_use]
    pub fn new(writer: OwnedFd) -> Self {
        Self {
            writer: File::from(writer),
        }
    }

    /// Sends the user command and closes the pipe, releasing `init`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails, e.g. because init already died.
    pub fn send(mut self, argv: &[String]) -> Result<()> {
        let payload = join_command(argv);
        tracing::debug!(command = %payload, "sending command to init");
        self.writer
            .write_all(payload.as_bytes())
            .map_err(|e| BurrowError::io("command pipe", e))
    }
}

/// Wire format of the command: arguments joined by single spaces.
///
/// Arguments that themselves contain spaces do not survive the trip.
#[must_use]
pub fn join_command(argv: &[String]) -> String {
    argv.join(" ")
}
