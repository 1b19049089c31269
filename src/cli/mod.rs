//! CLI argument parsing for mswarm.
//!
//! Uses clap derive macros. The flags cover what a single run needs; the
//! rest of the harness is configured through the optional settings file.

use crate::config::SwarmSettings;
use crate::error::Result;
use crate::swarm::RunOptions;
use clap::Parser;
use std::path::PathBuf;

/// Start a swarm of agents with different ids on one host to scale-test a
/// coordinator.
///
/// Runs until interrupted. On Ctrl-C every agent started by this run is
/// stopped and its files removed, then any remaining agent processes and
/// swarm temp files on the host are swept away.
#[derive(Parser, Debug)]
#[command(name = "mswarm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The number of minions to make.
    #[arg(short, long, default_value_t = 5)]
    pub minions: usize,

    /// The location of the coordinator this swarm will serve.
    #[arg(long, default_value = "salt")]
    pub master: String,

    /// Modules to keep enabled; every other known module is disabled.
    #[arg(short, long = "keep-modules", value_delimiter = ',')]
    pub keep_modules: Vec<String>,

    /// Run the minions with debug output going to the terminal.
    #[arg(short, long)]
    pub foreground: bool,

    /// Settings file (YAML) for agent/keygen commands and cleanup policy.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Abort the run if shared key generation fails.
    #[arg(long)]
    pub strict_credentials: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load the settings file (or defaults) and apply flag overrides.
    pub fn settings(&self) -> Result<SwarmSettings> {
        let mut settings = match &self.config {
            Some(path) => SwarmSettings::load(path)?,
            None => SwarmSettings::default(),
        };
        if self.strict_credentials {
            settings.strict_credentials = true;
        }
        Ok(settings)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            minions: self.minions,
            master: self.master.clone(),
            keep: self.keep_modules.clone(),
            foreground: self.foreground,
        }
    }
}
