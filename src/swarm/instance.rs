//! Instance records and the per-instance config builder.

use super::run::FleetRun;
use crate::error::{Result, SwarmError};
use crate::fs::atomic_write_file;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the agent config inside an instance directory.
pub const CONFIG_FILE_NAME: &str = "minion";

/// File name of the agent log inside an instance directory.
pub const LOG_FILE_NAME: &str = "minion.log";

/// Name of the agent cache directory inside an instance directory.
pub const CACHE_DIR_NAME: &str = "cache";

/// One simulated agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    /// Unique identity within the run.
    pub id: String,
    /// Isolated runtime directory owned by this instance.
    pub runtime_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub log_file: PathBuf,
    pub config_file: PathBuf,
    /// Sibling of the runtime directory: `<runtime_dir>.pid`.
    pub pid_file: PathBuf,
    /// Pid of the spawned agent, once launched.
    pub pid: Option<u32>,
}

impl InstanceRecord {
    /// Derive every instance path from its runtime directory.
    pub fn at(id: String, runtime_dir: PathBuf) -> Self {
        let mut pid_file = OsString::from(runtime_dir.as_os_str());
        pid_file.push(".pid");

        Self {
            id,
            cache_dir: runtime_dir.join(CACHE_DIR_NAME),
            log_file: runtime_dir.join(LOG_FILE_NAME),
            config_file: runtime_dir.join(CONFIG_FILE_NAME),
            pid_file: PathBuf::from(pid_file),
            runtime_dir,
            pid: None,
        }
    }
}

/// The config document an agent reads at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub user: String,
    pub pki_dir: PathBuf,
    pub cachedir: PathBuf,
    pub master: String,
    pub log_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_modules: Option<Vec<String>>,
}

/// Generate an instance identity.
///
/// 128 random bits rendered as 32 hex characters. Uniqueness is the goal,
/// not secrecy.
pub fn generate_identity() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Discover the agent's full capability set from a module directory.
///
/// Each entry contributes the part of its name before the first `.`, so
/// `cmd.py` and `cmd.pyc` both name `cmd`.
pub fn discover_capabilities(modules_dir: &Path) -> Result<BTreeSet<String>> {
    let entries = fs::read_dir(modules_dir).map_err(|e| {
        SwarmError::UserError(format!(
            "failed to read modules directory '{}': {}",
            modules_dir.display(),
            e
        ))
    })?;

    let mut capabilities = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            SwarmError::UserError(format!(
                "failed to read modules directory '{}': {}",
                modules_dir.display(),
                e
            ))
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(stem) = name.split('.').next()
            && !stem.is_empty()
        {
            capabilities.insert(stem.to_string());
        }
    }

    Ok(capabilities)
}

/// Capabilities to disable: everything known that is not in `keep`.
///
/// An empty keep list disables nothing.
pub fn disabled_capabilities(keep: &[String], known: &BTreeSet<String>) -> Vec<String> {
    if keep.is_empty() {
        return Vec::new();
    }

    known
        .iter()
        .filter(|capability| !keep.contains(*capability))
        .cloned()
        .collect()
}

/// Build one instance: create its runtime directory and write its config.
///
/// The returned record is not yet registered or launched. On failure no
/// directory is left behind.
pub fn build_instance(run: &FleetRun) -> Result<InstanceRecord> {
    let pki_dir = run.credential_dir.clone().ok_or_else(|| {
        SwarmError::ConfigBuild("shared credential directory has not been provisioned".to_string())
    })?;

    let id = loop {
        let id = generate_identity();
        if !run.registry.contains(&id) {
            break id;
        }
    };

    let temp_root = run.settings.temp_root();
    let runtime_dir = tempfile::Builder::new()
        .prefix(&format!("{}-{}", run.settings.name_prefix, id))
        .suffix(".d")
        .tempdir_in(&temp_root)
        .map_err(|e| {
            SwarmError::ConfigBuild(format!(
                "failed to create runtime directory for {} under '{}': {}",
                id,
                temp_root.display(),
                e
            ))
        })?
        .keep();

    let record = InstanceRecord::at(id, runtime_dir);

    if let Err(e) = write_agent_config(run, &record, pki_dir) {
        if let Err(cleanup) = fs::remove_dir_all(&record.runtime_dir) {
            warn!(
                path = %record.runtime_dir.display(),
                error = %cleanup,
                "failed to remove runtime directory of unbuilt instance"
            );
        }
        return Err(e);
    }

    debug!(id = %record.id, path = %record.runtime_dir.display(), "instance config written");
    Ok(record)
}

fn write_agent_config(run: &FleetRun, record: &InstanceRecord, pki_dir: PathBuf) -> Result<()> {
    let config = AgentConfig {
        id: record.id.clone(),
        user: run.user.clone(),
        pki_dir,
        cachedir: record.cache_dir.clone(),
        master: run.options.master.clone(),
        log_file: record.log_file.clone(),
        disable_modules: run.disabled_capabilities(),
    };

    let yaml = serde_yaml::to_string(&config).map_err(|e| {
        SwarmError::ConfigBuild(format!(
            "failed to serialize config for {}: {}",
            record.id, e
        ))
    })?;

    atomic_write_file(&record.config_file, &yaml)
}
