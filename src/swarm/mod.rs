//! Fleet lifecycle management.
//!
//! A swarm run provisions one shared credential directory, builds an
//! isolated runtime directory and config file per agent instance, launches
//! one background agent per config, then waits for an interrupt.
//!
//! # Teardown
//!
//! Teardown happens in two tiers:
//! - Graceful: every instance in this run's registry gets SIGTERM (when its
//!   pid file is readable), then its pid file and directory are removed.
//! - Forced sweep: always runs at exit. Any process whose command line
//!   matches the agent gets SIGKILL, and every artifact under the temp root
//!   matching `<prefix>*` is removed, including leftovers from crashed runs.
//!
//! Cleanup steps go through [`BestEffort`], which logs failures and keeps
//! going.

mod best_effort;
mod credentials;
mod instance;
mod launcher;
mod lifecycle;
mod process;
mod registry;
mod run;
mod shutdown;
mod teardown;

#[cfg(test)]
mod tests;

pub use lifecycle::{Lifecycle, sweep_stale};
pub use run::{FleetRun, RunOptions};
pub use shutdown::ShutdownSignal;
