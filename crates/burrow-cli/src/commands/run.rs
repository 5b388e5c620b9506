//! `burrow run`: Create and start a container.

use burrow_common::types::{ResourceConfig, validate_container_name};
use burrow_runtime::engine::{Engine, RunOutcome, RunRequest};
use clap::Args;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Attach to the terminal and wait for the container to exit.
    #[arg(short = 't', long)]
    pub tty: bool,

    /// Run in the background (the default without `-t`).
    #[arg(short, long, conflicts_with = "tty")]
    pub detach: bool,

    /// Memory limit written to `memory.max`, e.g. `100m`.
    #[arg(short, long, default_value = "")]
    pub memory: String,

    /// Relative CPU weight (1-10000).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=10_000))]
    pub cpu_weight: Option<u64>,

    /// CPUs the container may use, e.g. `0-1`.
    #[arg(long)]
    pub cpuset: Option<String>,

    /// Bind a host directory, `hostPath:containerPath`.
    #[arg(short, long, default_value = "")]
    pub volume: String,

    /// Container name; defaults to the generated id.
    #[arg(long, default_value = "", value_parser = parse_name)]
    pub name: String,

    /// Extra environment variable, `KEY=VALUE`. Repeatable.
    #[arg(short, long = "env")]
    pub env: Vec<String>,

    /// Port mapping, `host:container`. Repeatable.
    #[arg(short, long = "publish")]
    pub publish: Vec<String>,

    /// Network to attach the container to.
    #[arg(long)]
    pub net: Option<String>,

    /// Image archive name.
    pub image: String,

    /// Command and arguments to run.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

fn parse_name(raw: &str) -> Result<String, String> {
    if !raw.is_empty() {
        validate_container_name(raw).map_err(|e| e.to_string())?;
    }
    Ok(raw.to_string())
}

impl RunArgs {
    fn into_request(self) -> RunRequest {
        RunRequest {
            tty: self.tty,
            name: self.name,
            image: self.image,
            command: self.command,
            volume: self.volume,
            resources: ResourceConfig {
                memory_limit: self.memory,
                cpu_weight: self.cpu_weight,
                cpu_set: self.cpuset,
            },
            env: self.env,
            network: self.net,
            ports: self.publish,
        }
    }
}

/// Executes the `run` command.
///
/// A foreground run exits the CLI with the container's exit code.
///
/// # Errors
///
/// Returns an error if the container cannot be created or started.
pub fn execute(engine: &Engine, args: RunArgs) -> anyhow::Result<()> {
    let request = args.into_request();
    if request.tty {
        // Ctrl+C reaches the container through the shared process group;
        // the CLI stays alive to record the exit and tear down.
        ctrlc::set_handler(|| {})
            .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;
    }

    match engine.run(&request)? {
        RunOutcome::Detached(record) => {
            println!("{}", record.id);
            Ok(())
        }
        RunOutcome::Exited { code, .. } => std::process::exit(code),
    }
}
