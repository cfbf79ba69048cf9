//! uniroute command-line entry point.

use std::io::Write;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use uniroute::cli::{Cli, execute};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let output = execute(&cli).context("uniroute failed")?;

    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{output}")?;
    stdout.flush()?;
    Ok(())
}

/// Logs go to stderr so stdout carries only answers.
fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "warn,uniroute=debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}
