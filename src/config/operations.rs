//! Settings loading, validation, and derived values.

use super::model::SwarmSettings;
use crate::error::{Result, SwarmError};
use std::path::{Path, PathBuf};
use std::time::Duration;

impl SwarmSettings {
    /// Load settings from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            SwarmError::UserError(format!(
                "failed to read settings file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string.
    ///
    /// Unknown fields are ignored. An empty document yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: SwarmSettings = if yaml.trim().is_empty() {
            SwarmSettings::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| {
                SwarmError::UserError(format!("failed to parse settings YAML: {}", e))
            })?
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings values.
    ///
    /// - `agent_command` and `keygen_command` must parse to at least one word
    /// - `name_prefix` must be non-empty and contain no path separator or glob metacharacter
    /// - `poll_interval_ms` must be positive
    pub fn validate(&self) -> Result<()> {
        self.agent_argv()?;
        self.keygen_argv()?;

        if self.name_prefix.is_empty() {
            return Err(SwarmError::UserError(
                "settings validation failed: name_prefix must be non-empty".to_string(),
            ));
        }
        if self
            .name_prefix
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '*' | '?' | '[' | ']' | '{' | '}'))
        {
            return Err(SwarmError::UserError(format!(
                "settings validation failed: name_prefix '{}' must be a plain file name",
                self.name_prefix
            )));
        }

        if self.poll_interval_ms == 0 {
            return Err(SwarmError::UserError(
                "settings validation failed: poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if let Some(pattern) = &self.sweep_pattern
            && pattern.trim().is_empty()
        {
            return Err(SwarmError::UserError(
                "settings validation failed: sweep_pattern must be non-empty when set".to_string(),
            ));
        }

        Ok(())
    }

    /// The agent command split into program and arguments.
    pub fn agent_argv(&self) -> Result<Vec<String>> {
        split_command("agent_command", &self.agent_command)
    }

    /// The credential tool command split into program and arguments.
    pub fn keygen_argv(&self) -> Result<Vec<String>> {
        split_command("keygen_command", &self.keygen_command)
    }

    /// Directory under which all run artifacts are created.
    pub fn temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Glob matching every artifact this tool creates under `temp_root`.
    pub fn artifact_glob(&self) -> String {
        format!("{}*", self.name_prefix)
    }

    /// Substring the forced sweep looks for in process command lines.
    pub fn sweep_pattern(&self) -> Result<String> {
        if let Some(pattern) = &self.sweep_pattern {
            return Ok(pattern.clone());
        }

        let argv = self.agent_argv()?;
        let program = Path::new(&argv[0])
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| argv[0].clone());
        Ok(program)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn split_command(field: &str, command: &str) -> Result<Vec<String>> {
    let argv = shell_words::split(command).map_err(|e| {
        SwarmError::UserError(format!(
            "failed to parse {} '{}': {}\n\
             Fix: check for unmatched quotes or invalid escape sequences.",
            field, command, e
        ))
    })?;

    if argv.is_empty() {
        return Err(SwarmError::UserError(format!(
            "settings validation failed: {} must not be empty",
            field
        )));
    }

    Ok(argv)
}
