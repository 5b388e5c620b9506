//! `burrow logs`: Print the output of a detached container.

use std::io::Write;

use anyhow::Context;
use burrow_runtime::engine::Engine;
use clap::Args;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the container is not found or its log is
/// unreadable.
pub fn execute(engine: &Engine, args: &LogsArgs) -> anyhow::Result<()> {
    let log = engine.logs(&args.container)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&log).context("failed to write log to stdout")?;
    stdout.flush().context("failed to flush stdout")?;
    Ok(())
}
