//! End-to-end tests for the swarm lifecycle, using shell-script stand-ins
//! for the agent and the credential tool.

use super::best_effort::{BestEffort, Outcome, Step};
use super::instance::AgentConfig;
use super::lifecycle::{LaunchSummary, Lifecycle, Phase};
use super::process::{is_process_alive, read_pid_file};
use super::run::{FleetRun, RunOptions};
use super::shutdown::ShutdownSignal;
use super::teardown::forced_sweep;
use crate::error::SwarmError;
use crate::test_support::{fake_agent, fake_keygen, test_settings, wait_for_file};
use serial_test::serial;
use std::collections::HashSet;
use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn swarm_settings(temp_dir: &TempDir) -> crate::config::SwarmSettings {
    let mut settings = test_settings(temp_dir);
    let agent = fake_agent(temp_dir);
    settings.agent_command = agent.display().to_string();
    settings.keygen_command = fake_keygen(temp_dir).display().to_string();
    settings.sweep_processes = true;
    settings.sweep_pattern = Some(agent.display().to_string());
    settings
}

fn options(minions: usize, master: &str) -> RunOptions {
    RunOptions {
        minions,
        master: master.to_string(),
        keep: Vec::new(),
        foreground: false,
    }
}

fn artifacts_under(root: &std::path::Path) -> Vec<PathBuf> {
    fs::read_dir(root)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("mswarm")
        })
        .collect()
}

fn wait_until_dead(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !is_process_alive(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
#[serial]
fn test_three_instances_start_and_tear_down() {
    let temp_dir = TempDir::new().unwrap();
    let settings = swarm_settings(&temp_dir);
    let root = settings.temp_root();
    let run = FleetRun::new(options(3, "test-master"), settings).unwrap();
    let shutdown = ShutdownSignal::new();
    let mut lifecycle = Lifecycle::new(run, shutdown.clone());

    lifecycle.provision().unwrap();
    assert_eq!(lifecycle.phase(), Phase::Provisioning);
    let credential_dir = lifecycle.run().credential_dir.clone().unwrap();
    assert!(credential_dir.join("minion.pem").exists());

    let summary = lifecycle.launch_all().unwrap();
    assert_eq!(
        summary,
        LaunchSummary {
            requested: 3,
            launched: 3,
            skipped: 0,
            failed: 0,
            interrupted: 0,
        }
    );

    let registry = &lifecycle.run().registry;
    assert_eq!(registry.len(), 3);
    let ids: HashSet<_> = registry.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids.len(), 3);

    let mut agent_pids = Vec::new();
    let mut dirs = Vec::new();
    for record in registry.iter() {
        assert!(record.pid.is_some());
        let config: AgentConfig =
            serde_yaml::from_str(&fs::read_to_string(&record.config_file).unwrap()).unwrap();
        assert_eq!(config.master, "test-master");
        assert_eq!(config.pki_dir, credential_dir);

        assert!(wait_for_file(&record.pid_file, Duration::from_secs(5)));
        agent_pids.push(read_pid_file(&record.pid_file).unwrap());
        dirs.push(record.runtime_dir.clone());
    }

    shutdown.trigger();
    lifecycle.await_interrupt();
    assert_eq!(lifecycle.phase(), Phase::Running);

    assert_eq!(lifecycle.teardown(), 3);
    assert_eq!(lifecycle.phase(), Phase::Done);
    assert!(lifecycle.run().registry.is_empty());
    for dir in &dirs {
        assert!(!dir.exists(), "{} should be removed", dir.display());
    }
    let terminated: Vec<_> = lifecycle
        .effort()
        .attempts()
        .iter()
        .filter(|a| matches!(a.step, Step::Terminate(_)) && a.outcome == Outcome::Done)
        .collect();
    assert_eq!(terminated.len(), 3);
    for pid in agent_pids {
        assert!(wait_until_dead(pid, Duration::from_secs(5)));
    }

    // Second teardown: nothing left to signal.
    let attempts_before = lifecycle.effort().attempts().len();
    assert_eq!(lifecycle.teardown(), 0);
    assert_eq!(lifecycle.effort().attempts().len(), attempts_before);

    lifecycle.sweep();
    assert_eq!(lifecycle.phase(), Phase::Done);
    assert!(!credential_dir.exists());
    assert!(artifacts_under(&root).is_empty());
}

#[test]
#[serial]
fn test_execute_runs_to_completion_after_interrupt() {
    let temp_dir = TempDir::new().unwrap();
    let settings = swarm_settings(&temp_dir);
    let root = settings.temp_root();
    let run = FleetRun::new(options(2, "salt"), settings).unwrap();
    let shutdown = ShutdownSignal::new();
    let interrupter = shutdown.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        interrupter.trigger();
    });

    Lifecycle::new(run, shutdown).execute().unwrap();
    handle.join().unwrap();

    assert!(artifacts_under(&root).is_empty());
}

#[test]
#[serial]
fn test_interrupt_stops_launching_further_instances() {
    let temp_dir = TempDir::new().unwrap();
    let settings = swarm_settings(&temp_dir);
    let run = FleetRun::new(options(5, "salt"), settings).unwrap();
    let shutdown = ShutdownSignal::new();
    let mut lifecycle = Lifecycle::new(run, shutdown.clone());

    lifecycle.provision().unwrap();
    shutdown.trigger();
    let summary = lifecycle.launch_all().unwrap();

    assert_eq!(
        summary,
        LaunchSummary {
            requested: 5,
            launched: 0,
            skipped: 0,
            failed: 0,
            interrupted: 5,
        }
    );
    assert!(lifecycle.run().registry.is_empty());
}

#[test]
#[serial]
fn test_interrupt_before_launch_goes_straight_to_cleanup() {
    let temp_dir = TempDir::new().unwrap();
    let settings = swarm_settings(&temp_dir);
    let root = settings.temp_root();
    let run = FleetRun::new(options(5, "salt"), settings).unwrap();
    let shutdown = ShutdownSignal::new();
    shutdown.trigger();

    Lifecycle::new(run, shutdown).execute().unwrap();

    assert!(artifacts_under(&root).is_empty());
}

#[test]
#[serial]
fn test_foreground_instance_starts_and_tears_down() {
    let temp_dir = TempDir::new().unwrap();
    let settings = swarm_settings(&temp_dir);
    let root = settings.temp_root();
    let mut run_options = options(1, "salt");
    run_options.foreground = true;
    let run = FleetRun::new(run_options, settings).unwrap();
    let mut lifecycle = Lifecycle::new(run, ShutdownSignal::new());

    lifecycle.provision().unwrap();
    let summary = lifecycle.launch_all().unwrap();
    assert_eq!(summary.launched, 1);

    let record = lifecycle.run().registry.iter().next().unwrap().clone();
    assert!(wait_for_file(&record.pid_file, Duration::from_secs(5)));
    let pid = read_pid_file(&record.pid_file).unwrap();
    let argv = fs::read_to_string(record.runtime_dir.join("argv")).unwrap();
    let argv: Vec<_> = argv.split_whitespace().collect();
    assert!(argv.ends_with(&["-l", "debug"]));
    assert!(!argv.contains(&"-d"));

    assert_eq!(lifecycle.teardown(), 1);
    assert!(wait_until_dead(pid, Duration::from_secs(5)));
    assert!(!record.runtime_dir.exists());

    lifecycle.sweep();
    assert!(artifacts_under(&root).is_empty());
}

#[test]
#[serial]
fn test_zero_instances() {
    let temp_dir = TempDir::new().unwrap();
    let settings = swarm_settings(&temp_dir);
    let run = FleetRun::new(options(0, "salt"), settings).unwrap();
    let mut lifecycle = Lifecycle::new(run, ShutdownSignal::new());

    lifecycle.provision().unwrap();
    let summary = lifecycle.launch_all().unwrap();

    assert_eq!(summary.requested, 0);
    assert_eq!(summary.launched, 0);
    assert!(lifecycle.run().registry.is_empty());
    assert_eq!(lifecycle.teardown(), 0);
}

#[test]
#[serial]
fn test_launch_failures_are_skipped_and_still_torn_down() {
    let temp_dir = TempDir::new().unwrap();
    let mut settings = swarm_settings(&temp_dir);
    settings.agent_command = "mswarm-no-such-agent".to_string();
    let root = settings.temp_root();
    let run = FleetRun::new(options(3, "salt"), settings).unwrap();
    let mut lifecycle = Lifecycle::new(run, ShutdownSignal::new());

    lifecycle.provision().unwrap();
    let summary = lifecycle.launch_all().unwrap();

    assert_eq!(summary.launched, 0);
    assert_eq!(summary.failed, 3);
    assert_eq!(lifecycle.run().registry.len(), 3);
    assert!(lifecycle.run().registry.iter().all(|r| r.pid.is_none()));

    assert_eq!(lifecycle.teardown(), 3);
    lifecycle.sweep();
    assert!(artifacts_under(&root).is_empty());
}

#[test]
#[serial]
fn test_abort_on_instance_error_stops_after_first_failure() {
    let temp_dir = TempDir::new().unwrap();
    let mut settings = swarm_settings(&temp_dir);
    settings.agent_command = "mswarm-no-such-agent".to_string();
    settings.abort_on_instance_error = true;
    let root = settings.temp_root();
    let run = FleetRun::new(options(3, "salt"), settings).unwrap();

    let err = Lifecycle::new(run, ShutdownSignal::new())
        .execute()
        .unwrap_err();

    assert!(matches!(err, SwarmError::Launch(_)));
    assert!(artifacts_under(&root).is_empty());
}

#[test]
#[serial]
fn test_strict_credentials_failure_still_sweeps() {
    let temp_dir = TempDir::new().unwrap();
    let mut settings = swarm_settings(&temp_dir);
    settings.keygen_command = "false".to_string();
    settings.strict_credentials = true;
    let root = settings.temp_root();
    let run = FleetRun::new(options(3, "salt"), settings).unwrap();

    let err = Lifecycle::new(run, ShutdownSignal::new())
        .execute()
        .unwrap_err();

    assert!(matches!(err, SwarmError::Provision(_)));
    assert!(artifacts_under(&root).is_empty());
}

#[test]
#[serial]
fn test_lenient_credentials_failure_still_launches() {
    let temp_dir = TempDir::new().unwrap();
    let mut settings = swarm_settings(&temp_dir);
    settings.keygen_command = "false".to_string();
    let run = FleetRun::new(options(1, "salt"), settings).unwrap();
    let mut lifecycle = Lifecycle::new(run, ShutdownSignal::new());

    lifecycle.provision().unwrap();
    let summary = lifecycle.launch_all().unwrap();

    assert_eq!(summary.launched, 1);
    let record = lifecycle.run().registry.iter().next().unwrap().clone();
    assert!(wait_for_file(&record.pid_file, Duration::from_secs(5)));
    lifecycle.teardown();
}

#[test]
#[serial]
fn test_forced_sweep_kills_stale_agent_from_previous_run() {
    let temp_dir = TempDir::new().unwrap();
    let settings = swarm_settings(&temp_dir);
    let root = settings.temp_root();

    // Leftovers from a crashed run: a live agent and its directory.
    let stale_dir = root.join("mswarm-deadbeef0001.d");
    fs::create_dir_all(&stale_dir).unwrap();
    let pid_file = root.join("mswarm-deadbeef0001.d.pid");
    let mut child = Command::new(&settings.agent_command)
        .arg("-c")
        .arg(&stale_dir)
        .arg("--pid-file")
        .arg(&pid_file)
        .arg("-d")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    assert!(wait_for_file(&pid_file, Duration::from_secs(5)));

    let mut effort = BestEffort::new();
    forced_sweep(&settings, &mut effort);

    let status = child.wait().unwrap();
    assert_eq!(status.signal(), Some(libc::SIGKILL));
    assert!(
        effort
            .attempts()
            .iter()
            .any(|a| a.step == Step::Kill(child.id()) && a.outcome == Outcome::Done)
    );
    assert!(!stale_dir.exists());
    assert!(!pid_file.exists());
}

#[test]
fn test_dropping_controller_sweeps() {
    let temp_dir = TempDir::new().unwrap();
    let settings = test_settings(&temp_dir);
    let root = settings.temp_root();
    fs::create_dir_all(root.join("mswarm-leftover.d")).unwrap();
    let run = FleetRun::new(options(1, "salt"), settings).unwrap();

    drop(Lifecycle::new(run, ShutdownSignal::new()));

    assert!(artifacts_under(&root).is_empty());
}
