//! Graceful teardown and forced sweep.

use super::best_effort::{BestEffort, Step};
use super::instance::InstanceRecord;
use super::process::{kill, read_pid_file, scan_processes, terminate};
use super::registry::FleetRegistry;
use crate::config::SwarmSettings;
use crate::error::{Result, SwarmError};
use globset::Glob;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

/// Stop and remove every instance in the registry, leaving it empty.
///
/// Returns the number of instances torn down. A second call finds an empty
/// registry and does nothing.
pub fn graceful_teardown(registry: &mut FleetRegistry, effort: &mut BestEffort) -> usize {
    let records = registry.drain();
    for record in &records {
        teardown_instance(record, effort);
    }
    records.len()
}

fn teardown_instance(record: &InstanceRecord, effort: &mut BestEffort) {
    match read_pid_file(&record.pid_file) {
        Some(pid) => {
            effort.run(Step::Terminate(pid), || terminate(pid));
        }
        None => effort.skip(
            Step::ReadPidFile(record.pid_file.clone()),
            "pid file missing or unreadable, treating instance as stopped",
        ),
    }

    effort.run(Step::RemovePidFile(record.pid_file.clone()), || {
        remove_path(&record.pid_file)
    });
    effort.run(Step::RemoveDir(record.runtime_dir.clone()), || {
        remove_path(&record.runtime_dir)
    });
}

/// Remove the runtime directory of an instance that never made it into the
/// registry, so teardown would not find it.
pub fn discard_instance_dir(dir: &Path, effort: &mut BestEffort) {
    effort.run(Step::RemoveDir(dir.to_path_buf()), || remove_path(dir));
}

/// Kill every matching agent process and remove every run artifact under
/// the temp root, whether or not this run created it.
pub fn forced_sweep(settings: &SwarmSettings, effort: &mut BestEffort) {
    if settings.sweep_processes {
        info!("Killing any remaining running minions");
        sweep_processes(settings, effort);
    }

    info!("Remove ALL related temp files/directories");
    sweep_artifacts(settings, effort);
}

fn sweep_processes(settings: &SwarmSettings, effort: &mut BestEffort) {
    let pattern = match settings.sweep_pattern() {
        Ok(pattern) => pattern,
        Err(e) => {
            effort.run::<(), _>(Step::ScanProcesses(String::new()), || Err(e));
            return;
        }
    };

    let pids = effort
        .run(Step::ScanProcesses(pattern.clone()), || scan_processes(&pattern))
        .unwrap_or_default();

    for pid in pids {
        effort.run(Step::Kill(pid), || kill(pid));
    }
}

fn sweep_artifacts(settings: &SwarmSettings, effort: &mut BestEffort) {
    let temp_root = settings.temp_root();
    let glob = settings.artifact_glob();

    let matches = effort.run(Step::ScanArtifacts(temp_root.clone()), || {
        let matcher = Glob::new(&glob)
            .map_err(|e| SwarmError::Teardown(format!("invalid artifact glob '{}': {}", glob, e)))?
            .compile_matcher();

        let entries = fs::read_dir(&temp_root).map_err(|e| {
            SwarmError::Teardown(format!(
                "failed to list '{}': {}",
                temp_root.display(),
                e
            ))
        })?;

        Ok(entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| matcher.is_match(entry.file_name()))
            .map(|entry| entry.path())
            .collect::<Vec<_>>())
    });

    for path in matches.unwrap_or_default() {
        effort.run(Step::RemoveArtifact(path.clone()), || remove_path(&path));
    }
}

/// Remove a file or directory tree. A path that is already gone is fine.
fn remove_path(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(SwarmError::Teardown(format!(
                "failed to inspect '{}': {}",
                path.display(),
                e
            )));
        }
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SwarmError::Teardown(format!(
            "failed to remove '{}': {}",
            path.display(),
            e
        ))),
    }
}
