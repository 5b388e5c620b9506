//! The container's first process.
//!
//! Runs as `burrow init` inside the new namespaces with the merged overlay
//! as its working directory. It waits for the parent to send the user
//! command over fd 3, switches root, mounts `/proc` and `/dev`, and
//! replaces itself with the command.

use std::convert::Infallible;
use std::ffi::CString;
use std::fs::File;
use std::io::Read;
use std::os::fd::{FromRawFd, RawFd};
use std::os::unix::ffi::{OsStrExt, OsStringExt};

use burrow_common::constants::COMMAND_PIPE_FD;
use burrow_common::error::{BurrowError, Result};
use burrow_core::filesystem::mount::{mount_dev, mount_proc};
use burrow_core::filesystem::pivot_root::pivot_root;

/// Reads the space-separated command until the writer closes the pipe.
///
/// # Errors
///
/// Returns an error if the read fails or no command was sent.
pub fn read_command(mut reader: impl Read) -> Result<Vec<String>> {
    let mut payload = String::new();
    let _ = reader
        .read_to_string(&mut payload)
        .map_err(|e| BurrowError::io("command pipe", e))?;

    let argv: Vec<String> = payload
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();
    if argv.is_empty() {
        return Err(BurrowError::Config {
            message: "init received an empty command".into(),
        });
    }
    Ok(argv)
}

/// Executes the init steps in order, once.
#[derive(Debug, Clone, Copy)]
pub struct InitSequencer {
    pipe_fd: RawFd,
}

impl Default for InitSequencer {
    fn default() -> Self {
        Self {
            pipe_fd: COMMAND_PIPE_FD,
        }
    }
}

impl InitSequencer {
    /// Reads the command, sets up the root and execs the command.
    ///
    /// Only returns on failure; the caller should exit non-zero.
    ///
    /// # Errors
    ///
    /// Returns the first failing step: pipe read, `pivot_root`, the
    /// `/proc` or `/dev` mount, command lookup, or `execve`.
    pub fn run(self) -> Result<Infallible> {
        // SAFETY: the parent dup'd the pipe's read end onto this descriptor
        // before exec; nothing else in this process owns it.
        let pipe = unsafe { File::from_raw_fd(self.pipe_fd) };
        let argv = read_command(pipe)?;
        tracing::info!(command = ?argv, "init received command");

        let root = std::env::current_dir().map_err(|e| BurrowError::io(".", e))?;
        pivot_root(&root)?;
        mount_proc()?;
        mount_dev()?;

        let program = which::which(&argv[0]).map_err(|_| BurrowError::NotFound {
            kind: "executable",
            id: argv[0].clone(),
        })?;
        tracing::debug!(program = %program.display(), "executing user command");

        let path = to_c_string(program.as_os_str().as_bytes().to_vec())?;
        let args = argv
            .into_iter()
            .map(|arg| to_c_string(arg.into_bytes()))
            .collect::<Result<Vec<_>>>()?;
        let env = std::env::vars_os()
            .map(|(key, value)| {
                let mut entry = key.into_vec();
                entry.push(b'=');
                entry.extend(value.into_vec());
                to_c_string(entry)
            })
            .collect::<Result<Vec<_>>>()?;

        nix::unistd::execve(&path, &args, &env)
            .map_err(|e| BurrowError::syscall(format!("execve {}", program.display()), e))
    }
}

fn to_c_string(bytes: Vec<u8>) -> Result<CString> {
    CString::new(bytes).map_err(|e| BurrowError::Config {
        message: format!("argument contains a NUL byte: {e}"),
    })
}
