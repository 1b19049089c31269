//! mswarm: start many agent instances on one host to load-test a coordinator.
//!
//! This is the main entry point for the `mswarm` CLI. It sets up logging,
//! parses arguments, runs the swarm lifecycle, and maps errors to exit codes.

mod cli;
mod config;
mod error;
mod exit_codes;
mod fs;
mod swarm;

#[cfg(test)]
mod test_support;

use cli::Cli;
use error::Result;
use std::process::ExitCode;
use swarm::{FleetRun, Lifecycle, ShutdownSignal, sweep_stale};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // RUST_LOG overrides the default `info` level.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse_args();

    match run(&cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

/// Run one swarm. Once settings are loaded the forced sweep always runs,
/// even if the controller cannot be set up.
fn run(cli: &Cli) -> Result<()> {
    let settings = cli.settings()?;

    let setup = FleetRun::new(cli.run_options(), settings.clone())
        .and_then(|run| Ok((run, ShutdownSignal::install()?)));

    match setup {
        Ok((run, shutdown)) => Lifecycle::new(run, shutdown).execute(),
        Err(e) => {
            sweep_stale(&settings);
            Err(e)
        }
    }
}
