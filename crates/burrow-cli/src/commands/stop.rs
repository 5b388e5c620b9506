//! `burrow stop`: Stop running containers.

use burrow_runtime::engine::Engine;
use clap::Args;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Names of the containers to stop.
    #[arg(required = true)]
    pub containers: Vec<String>,
}

/// Executes the `stop` command.
///
/// Every container is attempted; the first failure is returned.
///
/// # Errors
///
/// Returns an error if any container could not be stopped.
pub fn execute(engine: &Engine, args: &StopArgs) -> anyhow::Result<()> {
    let mut first_error = None;
    for name in &args.containers {
        match engine.stop(name) {
            Ok(_) => println!("{name}"),
            Err(e) => {
                tracing::error!(name, error = %e, "stop failed");
                let _ = first_error.get_or_insert(e);
            }
        }
    }
    first_error.map_or(Ok(()), |e| Err(e.into()))
}
