//! SwarmSettings struct definition and default implementation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for a swarm run that are not exposed as CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmSettings {
    // =========================================================================
    // External collaborators
    // =========================================================================
    /// Command used to start one agent. Split with shell quoting rules.
    #[serde(default = "default_agent_command")]
    pub agent_command: String,

    /// Command used to generate the shared keypair.
    #[serde(default = "default_keygen_command")]
    pub keygen_command: String,

    /// Directory whose entries name the agent's full capability set.
    /// Only consulted when a keep list is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules_dir: Option<PathBuf>,

    // =========================================================================
    // Filesystem layout
    // =========================================================================
    /// Parent directory for every run artifact (default: the OS temp dir).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_root: Option<PathBuf>,

    /// Name prefix shared by the credential dir, instance dirs and pid files.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    // =========================================================================
    // Failure policy
    // =========================================================================
    /// Treat a failed credential tool as fatal for the run.
    #[serde(default)]
    pub strict_credentials: bool,

    /// Abort the run when one instance fails to build or launch.
    #[serde(default)]
    pub abort_on_instance_error: bool,

    // =========================================================================
    // Runtime
    // =========================================================================
    /// How often the controller checks for an interrupt while running.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Whether the forced sweep scans the process table.
    #[serde(default = "default_true")]
    pub sweep_processes: bool,

    /// Substring matched against process command lines by the forced sweep.
    /// Defaults to the file name of the agent program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_pattern: Option<String>,
}

impl Default for SwarmSettings {
    fn default() -> Self {
        Self {
            agent_command: default_agent_command(),
            keygen_command: default_keygen_command(),
            modules_dir: None,
            temp_root: None,
            name_prefix: default_name_prefix(),
            strict_credentials: false,
            abort_on_instance_error: false,
            poll_interval_ms: default_poll_interval_ms(),
            sweep_processes: true,
            sweep_pattern: None,
        }
    }
}

fn default_agent_command() -> String {
    "salt-minion".to_string()
}

fn default_keygen_command() -> String {
    "salt-key".to_string()
}

fn default_name_prefix() -> String {
    "mswarm".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}
