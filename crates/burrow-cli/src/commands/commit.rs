//! `burrow commit`: Save a container's filesystem as an image.

use burrow_runtime::engine::Engine;
use clap::Args;

use crate::output::format_bytes;

/// Arguments for the `commit` command.
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Container name.
    pub container: String,

    /// Image name; written to `<image-root>/<image>.tar`.
    pub image: String,
}

/// Executes the `commit` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or the archive cannot be
/// written.
pub fn execute(engine: &Engine, args: &CommitArgs) -> anyhow::Result<()> {
    let packed = engine.commit(&args.container, &args.image)?;
    println!(
        "{} {} ({})",
        packed.path.display(),
        packed.digest,
        format_bytes(packed.size_bytes)
    );
    Ok(())
}
