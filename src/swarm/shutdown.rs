//! Interrupt handling.
//!
//! The controller blocks on a shared flag. The OS interrupt (SIGINT, and
//! SIGTERM/SIGHUP through ctrlc's `termination` feature) is its only
//! producer in a real run; tests trigger it directly. Repeated signals only
//! set the flag again, so teardown is entered at most once.

use crate::error::{Result, SwarmError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Cancellation flag shared between the signal handler and the controller.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Create a flag with no OS handler attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flag and route process interrupts to it.
    ///
    /// Can only succeed once per process.
    pub fn install() -> Result<Self> {
        let signal = Self::new();
        let handler_signal = signal.clone();
        ctrlc::set_handler(move || {
            if !handler_signal.is_triggered() {
                eprintln!("\nInterrupt received");
            }
            handler_signal.trigger();
        })
        .map_err(|e| {
            SwarmError::UserError(format!("failed to set interrupt handler: {}", e))
        })?;
        Ok(signal)
    }

    /// Request shutdown.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Block until shutdown is requested, checking every `poll`.
    pub fn wait(&self, poll: Duration) {
        while !self.is_triggered() {
            std::thread::sleep(poll);
        }
    }
}
