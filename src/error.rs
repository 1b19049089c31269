//! Error types for the mswarm CLI.
//!
//! Uses thiserror for derive macros. Only startup problems and the two
//! opt-in strict modes ever reach `main`; everything else is logged.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for swarm operations.
#[derive(Error, Debug)]
pub enum SwarmError {
    /// User provided invalid arguments or settings.
    #[error("{0}")]
    UserError(String),

    /// The shared credential set could not be generated.
    #[error("Credential provisioning failed: {0}")]
    Provision(String),

    /// An instance directory or config file could not be created.
    #[error("Instance config failed: {0}")]
    ConfigBuild(String),

    /// An agent process could not be spawned.
    #[error("Agent launch failed: {0}")]
    Launch(String),

    /// A cleanup step failed. Recorded by the best-effort executor, never fatal.
    #[error("Teardown step failed: {0}")]
    Teardown(String),
}

impl SwarmError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SwarmError::UserError(_) => exit_codes::USER_ERROR,
            SwarmError::Provision(_) => exit_codes::PROVISION_FAILURE,
            SwarmError::ConfigBuild(_) | SwarmError::Launch(_) => exit_codes::INSTANCE_FAILURE,
            SwarmError::Teardown(_) => exit_codes::SUCCESS,
        }
    }
}

/// Result type alias for swarm operations.
pub type Result<T> = std::result::Result<T, SwarmError>;
