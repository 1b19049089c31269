//! Best-effort executor for cleanup steps.
//!
//! Cleanup must never abort halfway: a directory may already be gone, a
//! process may have exited on its own. Each step is run, its outcome is
//! logged and recorded, and the caller moves on. The recorded attempts let
//! callers (and tests) see exactly what was tried.

use crate::error::Result;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// One cleanup action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Read an instance pid file.
    ReadPidFile(PathBuf),
    /// Send SIGTERM to a process.
    Terminate(u32),
    /// Send SIGKILL to a process.
    Kill(u32),
    /// Remove an instance pid file.
    RemovePidFile(PathBuf),
    /// Remove an instance runtime directory.
    RemoveDir(PathBuf),
    /// Scan the process table for leftover agents.
    ScanProcesses(String),
    /// List the temp root for leftover artifacts.
    ScanArtifacts(PathBuf),
    /// Remove a leftover artifact found by the sweep.
    RemoveArtifact(PathBuf),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::ReadPidFile(path) => write!(f, "read pid file {}", path.display()),
            Step::Terminate(pid) => write!(f, "terminate pid {}", pid),
            Step::Kill(pid) => write!(f, "kill pid {}", pid),
            Step::RemovePidFile(path) => write!(f, "remove pid file {}", path.display()),
            Step::RemoveDir(path) => write!(f, "remove directory {}", path.display()),
            Step::ScanProcesses(pattern) => write!(f, "scan processes matching '{}'", pattern),
            Step::ScanArtifacts(path) => write!(f, "scan {} for artifacts", path.display()),
            Step::RemoveArtifact(path) => write!(f, "remove artifact {}", path.display()),
        }
    }
}

/// What happened to a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Skipped(String),
    Failed(String),
}

/// A recorded step and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub step: Step,
    pub outcome: Outcome,
}

/// Runs cleanup steps, swallowing and recording failures.
#[derive(Debug, Default)]
pub struct BestEffort {
    attempts: Vec<Attempt>,
}

impl BestEffort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a step. Returns the step's value on success, `None` on failure.
    pub fn run<T, F>(&mut self, step: Step, action: F) -> Option<T>
    where
        F: FnOnce() -> Result<T>,
    {
        match action() {
            Ok(value) => {
                debug!(step = %step, "cleanup step done");
                self.record(step, Outcome::Done);
                Some(value)
            }
            Err(e) => {
                warn!(step = %step, error = %e, "cleanup step failed, continuing");
                self.record(step, Outcome::Failed(e.to_string()));
                None
            }
        }
    }

    /// Record a step that was deliberately not attempted.
    pub fn skip(&mut self, step: Step, reason: &str) {
        debug!(step = %step, reason, "cleanup step skipped");
        self.record(step, Outcome::Skipped(reason.to_string()));
    }

    /// Every step recorded so far, in order.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Number of steps that failed.
    pub fn failures(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| matches!(a.outcome, Outcome::Failed(_)))
            .count()
    }

    fn record(&mut self, step: Step, outcome: Outcome) {
        self.attempts.push(Attempt { step, outcome });
    }
}
