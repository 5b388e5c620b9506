//! `burrow exec`: Run a command inside a running container.

use burrow_runtime::engine::Engine;
use clap::Args;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container name.
    pub container: String,

    /// Command to execute.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command, exiting with the command's exit code.
///
/// # Errors
///
/// Returns an error if the container is not running or the helper cannot
/// be launched.
pub fn execute(engine: &Engine, args: &ExecArgs) -> anyhow::Result<()> {
    let code = engine.exec(&args.container, &args.command)?;
    std::process::exit(code);
}
