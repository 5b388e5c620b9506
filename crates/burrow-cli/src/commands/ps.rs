//! `burrow ps`: List containers.

use burrow_common::types::ContainerStatus;
use burrow_runtime::engine::Engine;
use clap::Args;

use crate::output::render_containers;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Show only running containers.
    #[arg(short, long)]
    pub running: bool,
}

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the state directory cannot be read.
pub fn execute(engine: &Engine, args: &PsArgs) -> anyhow::Result<()> {
    let containers: Vec<_> = engine
        .list()?
        .into_iter()
        .filter(|c| !args.running || c.status == ContainerStatus::Running)
        .collect();
    print!("{}", render_containers(&containers));
    Ok(())
}
