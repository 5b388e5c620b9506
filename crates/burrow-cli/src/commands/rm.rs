//! `burrow rm`: Remove stopped containers.

use burrow_runtime::engine::Engine;
use clap::Args;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Names of the containers to remove.
    #[arg(required = true)]
    pub containers: Vec<String>,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns an error if any container is still running or cannot be
/// removed.
pub fn execute(engine: &Engine, args: &RmArgs) -> anyhow::Result<()> {
    let mut first_error = None;
    for name in &args.containers {
        match engine.remove(name) {
            Ok(()) => println!("{name}"),
            Err(e) => {
                tracing::error!(name, error = %e, "remove failed");
                let _ = first_error.get_or_insert(e);
            }
        }
    }
    first_error.map_or(Ok(()), |e| Err(e.into()))
}
