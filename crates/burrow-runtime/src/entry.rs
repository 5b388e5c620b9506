//! Selecting what this invocation of the binary is.
//!
//! The same executable serves as the CLI, as the container's `init`, and
//! as the helper that `exec` starts inside a container. The choice is made
//! from argv and the environment before any other setup.

use std::process::Command;

use burrow_common::constants::{ENV_EXEC_CMD, ENV_EXEC_PID, INIT_SUBCOMMAND};
use burrow_core::namespace::join::enter_container_namespaces;

/// Role of the current process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryMode {
    /// Join the namespaces of `pid` and run `command` there.
    NamespaceEnter {
        /// Host PID of the container's init.
        pid: i32,
        /// Shell command line to run.
        command: String,
    },
    /// Container init; see [`crate::init::InitSequencer`].
    Init,
    /// Ordinary command-line use.
    Cli,
}

impl EntryMode {
    /// Inspects the real argv and environment.
    #[must_use]
    pub fn from_process() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::detect(&args, |key| std::env::var(key).ok())
    }

    /// Selects the mode from `args` (including argv\[0\]) and a variable
    /// lookup.
    ///
    /// The namespace-entry variables win over argv; both must be set and
    /// the PID must parse.
    pub fn detect(args: &[String], lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pid = lookup(ENV_EXEC_PID).and_then(|raw| raw.trim().parse::<i32>().ok());
        let command = lookup(ENV_EXEC_CMD).filter(|cmd| !cmd.is_empty());
        if let (Some(pid), Some(command)) = (pid, command) {
            return Self::NamespaceEnter { pid, command };
        }
        if args.get(1).map(String::as_str) == Some(INIT_SUBCOMMAND) {
            return Self::Init;
        }
        Self::Cli
    }
}

/// Joins the container's namespaces and runs `command` through `/bin/sh`.
///
/// Runs before logging is configured, so failures go straight to stderr.
/// A failed `setns` is reported and skipped. The command runs as a child
/// because joining a PID namespace only affects new children. Returns the
/// child's exit code.
#[allow(clippy::print_stderr)]
pub fn run_namespace_enter(pid: i32, command: &str) -> i32 {
    for (kind, error) in enter_container_namespaces(pid) {
        eprintln!("burrow: setns {kind} of pid {pid}: {error}");
    }

    match Command::new("/bin/sh").arg("-c").arg(command).status() {
        Ok(status) => status.code().unwrap_or(1),
        Err(error) => {
            eprintln!("burrow: cannot run {command:?}: {error}");
            127
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn exec_variables_select_namespace_enter() {
        let mode = EntryMode::detect(&argv(&["burrow", "init"]), |key| match key {
            "BURROW_EXEC_PID" => Some("4242".into()),
            "BURROW_EXEC_CMD" => Some("ls -l".into()),
            _ => None,
        });
        assert_eq!(
            mode,
            EntryMode::NamespaceEnter {
                pid: 4242,
                command: "ls -l".into()
            }
        );
    }

    #[test]
    fn pid_alone_is_not_enough() {
        let mode = EntryMode::detect(&argv(&["burrow", "ps"]), |key| {
            (key == "BURROW_EXEC_PID").then(|| "1".to_string())
        });
        assert_eq!(mode, EntryMode::Cli);
    }

    #[test]
    fn init_argument_selects_init() {
        assert_eq!(
            EntryMode::detect(&argv(&["/proc/self/exe", "init"]), |_| None),
            EntryMode::Init
        );
    }

    #[test]
    fn anything_else_is_cli() {
        assert_eq!(EntryMode::detect(&argv(&["burrow"]), |_| None), EntryMode::Cli);
        assert_eq!(
            EntryMode::detect(&argv(&["burrow", "run", "init"]), |_| None),
            EntryMode::Cli
        );
    }
}
