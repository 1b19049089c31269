//! OS process plumbing: external tool runs, pid files, signals, and the
//! process-table scan used by the forced sweep.

use crate::error::{Result, SwarmError};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::LazyLock;

static PS_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+(.+)$").expect("Invalid process line regex"));

/// Captured output of an external tool that exited successfully.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Standard output from the command (trimmed).
    pub stdout: String,
    /// Standard error from the command (trimmed).
    pub stderr: String,
}

impl ToolOutput {
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

/// Run an external command to completion with captured output.
///
/// `argv[0]` is the program. Spawn failures and non-zero exits are both
/// reported through `kind`, so each caller picks its own error category.
pub fn run_captured(argv: &[String], kind: fn(String) -> SwarmError) -> Result<ToolOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| kind("empty command".to_string()))?;

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| kind(format!("failed to execute {}: {}", program, e)))?;

    let tool_output = ToolOutput::from_output(&output);

    if output.status.success() {
        Ok(tool_output)
    } else {
        let exit_code = output.status.code().unwrap_or(-1);
        let error_msg = if tool_output.stderr.is_empty() {
            tool_output.stdout.clone()
        } else {
            tool_output.stderr.clone()
        };

        Err(kind(format!(
            "{} failed (exit code {}): {}",
            program, exit_code, error_msg
        )))
    }
}

/// Read a pid file.
///
/// A missing, unreadable, empty, or non-numeric file yields `None`: the
/// process is treated as already gone.
pub fn read_pid_file(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    match content.trim().parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(pid) => Some(pid),
    }
}

/// Send SIGTERM to a process.
pub fn terminate(pid: u32) -> Result<()> {
    send_signal(pid, libc::SIGTERM)
}

/// Send SIGKILL to a process.
pub fn kill(pid: u32) -> Result<()> {
    send_signal(pid, libc::SIGKILL)
}

/// Check if a process is still running.
#[cfg(test)]
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid_t) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid_t <= 0 {
        return false;
    }
    // kill(pid, 0) checks process existence without sending a signal
    unsafe { libc::kill(pid_t, 0) == 0 }
}

/// Deliver `signal` to `pid`. A process that no longer exists is not an error.
fn send_signal(pid: u32, signal: libc::c_int) -> Result<()> {
    // pid_t is i32; wrapping negative or hitting 0 would target a process group.
    let pid_t = match libc::pid_t::try_from(pid) {
        Ok(p) if p > 0 => p,
        _ => {
            return Err(SwarmError::Teardown(format!(
                "refusing to signal invalid pid {}",
                pid
            )));
        }
    };

    let result = unsafe { libc::kill(pid_t, signal) };
    if result == 0 {
        return Ok(());
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }

    Err(SwarmError::Teardown(format!(
        "failed to send signal {} to pid {}: {}",
        signal, pid, err
    )))
}

/// List pids of processes whose command line contains `pattern`.
///
/// The calling process is never included.
pub fn scan_processes(pattern: &str) -> Result<Vec<u32>> {
    let argv = ["ps", "-eo", "pid=,args="].map(String::from);
    let output = run_captured(&argv, SwarmError::Teardown)?;
    Ok(parse_process_table(
        &output.stdout,
        pattern,
        std::process::id(),
    ))
}

/// Parse `ps -eo pid=,args=` output into the pids whose args match.
pub fn parse_process_table(table: &str, pattern: &str, own_pid: u32) -> Vec<u32> {
    table
        .lines()
        .filter_map(|line| {
            let caps = PS_LINE_REGEX.captures(line)?;
            let pid = caps[1].parse::<u32>().ok()?;
            let args = &caps[2];
            (pid != own_pid && args.contains(pattern)).then_some(pid)
        })
        .collect()
}
