//! CLI command definitions and dispatch.

pub mod commit;
pub mod exec;
pub mod logs;
pub mod ps;
pub mod rm;
pub mod run;
pub mod stop;

use std::path::PathBuf;

use burrow_common::config::RuntimePaths;
use burrow_common::constants;
use burrow_runtime::context::RuntimeContext;
use burrow_runtime::engine::Engine;
use clap::{Args, Parser, Subcommand};

/// burrow: a minimal single-host container runtime.
#[derive(Parser, Debug)]
#[command(name = constants::BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// State locations.
    #[command(flatten)]
    pub paths: PathArgs,
}

/// Where containers, layers and images are kept.
#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Per-container metadata directory.
    #[arg(long, global = true, env = constants::ENV_INFO_ROOT, default_value = constants::DEFAULT_INFO_ROOT)]
    pub info_root: PathBuf,

    /// Per-container overlay layers.
    #[arg(long, global = true, env = constants::ENV_OVERLAY_ROOT, default_value = constants::DEFAULT_OVERLAY_ROOT)]
    pub overlay_root: PathBuf,

    /// Image archives (`<name>.tar`).
    #[arg(long, global = true, env = constants::ENV_IMAGE_ROOT, default_value = constants::DEFAULT_IMAGE_ROOT)]
    pub image_root: PathBuf,
}

impl PathArgs {
    fn into_paths(self) -> RuntimePaths {
        RuntimePaths {
            info_root: self.info_root,
            overlay_root: self.overlay_root,
            image_root: self.image_root,
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start a container.
    Run(run::RunArgs),
    /// List containers.
    Ps(ps::PsArgs),
    /// Print the output of a detached container.
    Logs(logs::LogsArgs),
    /// Run a command inside a running container.
    Exec(exec::ExecArgs),
    /// Stop running containers.
    Stop(stop::StopArgs),
    /// Remove stopped containers.
    Rm(rm::RmArgs),
    /// Save a container's filesystem as an image.
    Commit(commit::CommitArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let engine = Engine::new(RuntimeContext::new(cli.paths.into_paths()));
    match cli.command {
        Command::Run(args) => run::execute(&engine, args),
        Command::Ps(args) => ps::execute(&engine, &args),
        Command::Logs(args) => logs::execute(&engine, &args),
        Command::Exec(args) => exec::execute(&engine, &args),
        Command::Stop(args) => stop::execute(&engine, &args),
        Command::Rm(args) => rm::execute(&engine, &args),
        Command::Commit(args) => commit::execute(&engine, &args),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn path_flags_override_defaults() {
        let cli = Cli::try_parse_from(["burrow", "--info-root", "/tmp/run", "ps"]).unwrap();
        assert_eq!(cli.paths.info_root, PathBuf::from("/tmp/run"));
    }
}
