//! Shared credential provisioning.
//!
//! One keypair directory is generated per run and referenced by every
//! instance config. The directory follows the run's naming convention
//! (`<prefix>-pki-*`) so the forced sweep removes it.

use super::process::run_captured;
use crate::config::SwarmSettings;
use crate::error::{Result, SwarmError};
use std::path::PathBuf;
use tracing::{info, warn};

/// Name of the credential tool's log file inside the credential directory.
pub const KEY_LOG_FILE_NAME: &str = "keys.log";

/// The provisioned shared credential directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDir {
    pub path: PathBuf,
    /// False when the credential tool failed and lenient mode carried on.
    pub tool_succeeded: bool,
}

/// Create the shared credential directory and run the credential tool on it.
///
/// Failing to create the directory is always an error. A failing tool is an
/// error only with `strict_credentials`; otherwise it is logged and the
/// run continues, so agents start in a degraded state without valid keys.
pub fn provision(settings: &SwarmSettings) -> Result<CredentialDir> {
    let temp_root = settings.temp_root();
    let path = tempfile::Builder::new()
        .prefix(&format!("{}-pki-", settings.name_prefix))
        .tempdir_in(&temp_root)
        .map_err(|e| {
            SwarmError::Provision(format!(
                "failed to create credential directory under '{}': {}",
                temp_root.display(),
                e
            ))
        })?
        .keep();

    info!(path = %path.display(), "Creating shared pki keys for the swarm");

    let mut argv = settings.keygen_argv()?;
    let dir = path.to_string_lossy().into_owned();
    let log_file = path.join(KEY_LOG_FILE_NAME).to_string_lossy().into_owned();
    argv.extend([
        "-c".to_string(),
        dir.clone(),
        "--gen-keys".to_string(),
        "minion".to_string(),
        "--gen-keys-dir".to_string(),
        dir,
        "--key-logfile".to_string(),
        log_file,
    ]);

    match run_captured(&argv, SwarmError::Provision) {
        Ok(_) => {
            info!("Keys generated");
            Ok(CredentialDir {
                path,
                tool_succeeded: true,
            })
        }
        Err(e) if settings.strict_credentials => Err(e),
        Err(e) => {
            warn!(
                error = %e,
                "key generation failed; continuing without valid shared credentials"
            );
            Ok(CredentialDir {
                path,
                tool_succeeded: false,
            })
        }
    }
}
