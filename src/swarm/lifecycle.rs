//! The lifecycle controller.
//!
//! Drives one run through
//! `Idle -> Provisioning -> Launching -> Running -> GracefulTeardown -> Done`,
//! then always through `ForcedSweep -> Done`, even when an earlier phase
//! failed. Dropping a controller that has not swept yet runs the sweep, so
//! an early return or a panic still cleans up.

use super::best_effort::BestEffort;
use super::credentials::provision;
use super::instance::build_instance;
use super::launcher::launch;
use super::run::FleetRun;
use super::shutdown::ShutdownSignal;
use super::teardown::{discard_instance_dir, forced_sweep, graceful_teardown};
use crate::config::SwarmSettings;
use crate::error::{Result, SwarmError};
use tracing::{debug, info, warn};

/// Controller phases, in the order a run passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    Provisioning,
    Launching,
    Running,
    GracefulTeardown,
    ForcedSweep,
    Done,
}

/// Outcome of the launch phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSummary {
    /// Instances requested on the command line.
    pub requested: usize,
    /// Instances whose agent was spawned.
    pub launched: usize,
    /// Instances that could not be built; nothing of them remains on disk.
    pub skipped: usize,
    /// Instances that were built but whose agent failed to spawn. Their
    /// directories stay registered and are removed at teardown.
    pub failed: usize,
    /// Instances never attempted because an interrupt arrived first.
    pub interrupted: usize,
}

/// Top-level state machine for a swarm run.
#[derive(Debug)]
pub struct Lifecycle {
    run: FleetRun,
    shutdown: ShutdownSignal,
    phase: Phase,
    effort: BestEffort,
    swept: bool,
}

impl Lifecycle {
    pub fn new(run: FleetRun, shutdown: ShutdownSignal) -> Self {
        Self {
            run,
            shutdown,
            phase: Phase::Idle,
            effort: BestEffort::new(),
            swept: false,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn run(&self) -> &FleetRun {
        &self.run
    }

    /// Every cleanup step attempted so far.
    #[cfg(test)]
    pub fn effort(&self) -> &BestEffort {
        &self.effort
    }

    /// Run the whole lifecycle: start, wait for an interrupt, tear down,
    /// sweep. The sweep runs whatever the earlier phases returned.
    pub fn execute(mut self) -> Result<()> {
        let outcome = self.start();
        self.sweep();
        outcome
    }

    fn start(&mut self) -> Result<()> {
        self.provision()?;

        if let Err(e) = self.launch_all() {
            self.teardown();
            return Err(e);
        }

        self.await_interrupt();
        self.teardown();
        Ok(())
    }

    /// Provision the shared credential directory.
    pub fn provision(&mut self) -> Result<()> {
        self.transition(Phase::Provisioning);
        let credentials = provision(&self.run.settings)?;
        if !credentials.tool_succeeded {
            warn!(
                path = %credentials.path.display(),
                "minions will start without valid shared credentials"
            );
        }
        self.run.credential_dir = Some(credentials.path);
        Ok(())
    }

    /// Build and launch every requested instance, one after another.
    ///
    /// Failures skip the instance unless `abort_on_instance_error` is set,
    /// in which case the first failure is returned. Instances registered
    /// before the failure stay registered for teardown.
    ///
    /// An interrupt stops the loop before the next instance is built; the
    /// instances already started are left for teardown.
    pub fn launch_all(&mut self) -> Result<LaunchSummary> {
        self.transition(Phase::Launching);
        info!("Starting minions...");

        let abort = self.run.settings.abort_on_instance_error;
        let foreground = self.run.options.foreground;
        let mut summary = LaunchSummary {
            requested: self.run.options.minions,
            ..LaunchSummary::default()
        };

        for index in 1..=summary.requested {
            if self.shutdown.is_triggered() {
                summary.interrupted = summary.requested - index + 1;
                warn!(
                    not_attempted = summary.interrupted,
                    "interrupt received, no further minions will be started"
                );
                break;
            }

            let record = match build_instance(&self.run) {
                Ok(record) => record,
                Err(e) => {
                    note_failure(abort, index, e)?;
                    summary.skipped += 1;
                    continue;
                }
            };

            let runtime_dir = record.runtime_dir.clone();
            let record = match self.run.registry.insert(record) {
                Ok(record) => record,
                Err(e) => {
                    discard_instance_dir(&runtime_dir, &mut self.effort);
                    note_failure(abort, index, e)?;
                    summary.skipped += 1;
                    continue;
                }
            };

            match launch(record, &self.run.settings, foreground) {
                Ok(_) => summary.launched += 1,
                Err(e) => {
                    note_failure(abort, index, e)?;
                    summary.failed += 1;
                }
            }
        }

        info!("All {} minions have started.", summary.launched);
        if summary.skipped > 0 || summary.failed > 0 {
            warn!(
                requested = summary.requested,
                skipped = summary.skipped,
                failed = summary.failed,
                "not every requested minion was started"
            );
        }

        Ok(summary)
    }

    /// Block until the shutdown signal fires.
    pub fn await_interrupt(&mut self) {
        self.transition(Phase::Running);
        info!("Waiting for CTRL-C to properly shutdown minions...");
        self.shutdown.wait(self.run.settings.poll_interval());
    }

    /// Stop and remove every registered instance.
    ///
    /// Returns how many instances were torn down; a repeated call returns 0.
    pub fn teardown(&mut self) -> usize {
        if self.run.registry.is_empty() && self.phase >= Phase::GracefulTeardown {
            debug!("graceful teardown already done");
            return 0;
        }

        self.transition(Phase::GracefulTeardown);
        info!(
            count = self.run.registry.len(),
            uptime = %self.run.uptime_string(),
            "Shutting down minions"
        );
        let count = graceful_teardown(&mut self.run.registry, &mut self.effort);
        self.transition(Phase::Done);
        count
    }

    /// Run the forced sweep. Only the first call does any work.
    pub fn sweep(&mut self) {
        if self.swept {
            return;
        }
        self.swept = true;

        self.transition(Phase::ForcedSweep);
        forced_sweep(&self.run.settings, &mut self.effort);
        self.transition(Phase::Done);
        report_cleanup(&self.effort);
    }

    fn transition(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "phase change");
        self.phase = next;
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if !self.swept {
            self.sweep();
        }
    }
}

/// Run the forced sweep without a controller, for runs that failed before
/// one could be built.
pub fn sweep_stale(settings: &SwarmSettings) {
    let mut effort = BestEffort::new();
    forced_sweep(settings, &mut effort);
    report_cleanup(&effort);
}

fn report_cleanup(effort: &BestEffort) {
    let steps = effort.attempts().len();
    let failures = effort.failures();
    if failures > 0 {
        warn!(steps, failures, "Done, some cleanup steps failed");
    } else {
        info!(steps, "Done");
    }
}

/// Log an instance failure, or return it when the run should abort.
fn note_failure(abort: bool, index: usize, err: SwarmError) -> Result<()> {
    if abort {
        return Err(err);
    }
    warn!(instance = index, error = %err, "skipping minion");
    Ok(())
}
