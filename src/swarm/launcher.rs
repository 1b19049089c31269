//! Agent process launcher.

use super::instance::InstanceRecord;
use crate::config::SwarmSettings;
use crate::error::{Result, SwarmError};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Arguments appended to the agent command for one instance.
///
/// Foreground agents log at debug level to the terminal; background agents
/// daemonize.
pub fn agent_args(record: &InstanceRecord, foreground: bool) -> Vec<String> {
    let mut args = vec![
        "-c".to_string(),
        record.runtime_dir.to_string_lossy().into_owned(),
        "--pid-file".to_string(),
        record.pid_file.to_string_lossy().into_owned(),
    ];
    if foreground {
        args.extend(["-l".to_string(), "debug".to_string()]);
    } else {
        args.push("-d".to_string());
    }
    args
}

/// Spawn the agent for `record` and attach the spawned pid to it.
///
/// Returns once the OS has accepted the spawn. The agent runs in its own
/// process group, so terminal signals aimed at the controller do not reach
/// it. The agent writes its own pid file at some later point.
pub fn launch(record: &mut InstanceRecord, settings: &SwarmSettings, foreground: bool) -> Result<u32> {
    let argv = settings.agent_argv()?;
    let (program, base_args) = argv
        .split_first()
        .ok_or_else(|| SwarmError::Launch("agent command is empty".to_string()))?;

    let mut command = Command::new(program);
    command
        .args(base_args)
        .args(agent_args(record, foreground))
        .stdin(Stdio::null())
        .process_group(0);

    if foreground {
        command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    } else {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let mut child = command.spawn().map_err(|e| {
        SwarmError::Launch(format!(
            "failed to start agent '{}' for {}: {}\n\
             Fix: ensure the agent is installed and in PATH.",
            program, record.id, e
        ))
    })?;

    let pid = child.id();
    record.pid = Some(pid);

    // Reap the child when it exits so it never lingers as a zombie.
    let reaper = std::thread::Builder::new()
        .name(format!("reap-{}", pid))
        .spawn(move || {
            let _ = child.wait();
        });
    if let Err(e) = reaper {
        debug!(pid, error = %e, "failed to start reaper thread");
    }

    info!(id = %record.id, pid, "minion started");
    Ok(pid)
}
