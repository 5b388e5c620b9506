//! # burrow
//!
//! Minimal single-host container runtime.
//!
//! The binary plays three roles; the role is decided before anything else
//! runs. See [`EntryMode`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

mod commands;
mod output;

use burrow_runtime::entry::{EntryMode, run_namespace_enter};
use burrow_runtime::init::InitSequencer;
use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    // Joining a mount namespace requires a single-threaded process, so this
    // branch runs before any subscriber or handler is installed.
    let mode = EntryMode::from_process();
    if let EntryMode::NamespaceEnter { pid, command } = &mode {
        std::process::exit(run_namespace_enter(*pid, command));
    }

    init_tracing();
    match mode {
        EntryMode::Init => run_init(),
        _ => commands::execute(Cli::parse()),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn run_init() -> ! {
    match InitSequencer::default().run() {
        Ok(never) => match never {},
        Err(e) => {
            tracing::error!(error = %e, "container init failed");
            std::process::exit(1);
        }
    }
}

