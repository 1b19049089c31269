//! The state of one swarm invocation.

use super::instance::{disabled_capabilities, discover_capabilities};
use super::registry::FleetRegistry;
use crate::config::SwarmSettings;
use crate::error::{Result, SwarmError};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::ffi::CStr;
use std::path::PathBuf;

/// What the user asked for on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Number of instances to start.
    pub minions: usize,
    /// Coordinator address written into every instance config.
    pub master: String,
    /// Capabilities to leave enabled. Empty means disable nothing.
    pub keep: Vec<String>,
    /// Run agents with debug output on the terminal instead of daemonized.
    pub foreground: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            minions: 5,
            master: "salt".to_string(),
            keep: Vec::new(),
            foreground: false,
        }
    }
}

/// Process-wide state for one run, owned by the lifecycle controller.
#[derive(Debug)]
pub struct FleetRun {
    pub options: RunOptions,
    pub settings: SwarmSettings,
    /// Shared credential directory, set once provisioning has run.
    pub credential_dir: Option<PathBuf>,
    /// Full capability set; only populated when a keep list was given.
    pub known_capabilities: BTreeSet<String>,
    pub registry: FleetRegistry,
    /// User name written into every instance config.
    pub user: String,
    pub started_at: DateTime<Utc>,
}

impl FleetRun {
    /// Create a run.
    ///
    /// When a keep list is given, the capability set is discovered here so a
    /// bad `modules_dir` fails before anything is created on disk.
    pub fn new(options: RunOptions, settings: SwarmSettings) -> Result<Self> {
        let options = RunOptions {
            keep: normalize_keep_list(&options.keep),
            ..options
        };

        let known_capabilities = if options.keep.is_empty() {
            BTreeSet::new()
        } else {
            let modules_dir = settings.modules_dir.as_ref().ok_or_else(|| {
                SwarmError::UserError(
                    "--keep-modules requires `modules_dir` in the settings file".to_string(),
                )
            })?;
            discover_capabilities(modules_dir)?
        };

        Ok(Self {
            options,
            settings,
            credential_dir: None,
            known_capabilities,
            registry: FleetRegistry::new(),
            user: invoking_user(),
            started_at: Utc::now(),
        })
    }

    /// The `disable_modules` value for instance configs, if any.
    pub fn disabled_capabilities(&self) -> Option<Vec<String>> {
        if self.options.keep.is_empty() {
            return None;
        }
        Some(disabled_capabilities(
            &self.options.keep,
            &self.known_capabilities,
        ))
    }

    /// Time since the run started, formatted for log lines.
    pub fn uptime_string(&self) -> String {
        let age = Utc::now().signed_duration_since(self.started_at);
        let seconds = age.num_seconds();
        let minutes = age.num_minutes();
        let hours = age.num_hours();

        if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds)
        }
    }
}

/// Trim entries and drop empty ones, so `-k ''` keeps the "disable nothing" meaning.
fn normalize_keep_list(keep: &[String]) -> Vec<String> {
    keep.iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Name of the user running the swarm.
fn invoking_user() -> String {
    if let Ok(user) = std::env::var("USER").or_else(|_| std::env::var("USERNAME"))
        && !user.is_empty()
    {
        return user;
    }

    // Safety: getpwuid returns null or a pointer to static storage that stays
    // valid until the next getpw* call; the name is copied out immediately.
    unsafe {
        let entry = libc::getpwuid(libc::getuid());
        if !entry.is_null() && !(*entry).pw_name.is_null() {
            return CStr::from_ptr((*entry).pw_name)
                .to_string_lossy()
                .into_owned();
        }
    }

    "unknown".to_string()
}
