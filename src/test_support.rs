use crate::config::SwarmSettings;
use crate::swarm::{FleetRun, RunOptions};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Settings confined to `temp_dir`: artifacts go to `<temp_dir>/tmp`, the
/// credential tool always succeeds, and the process sweep is off.
pub(crate) fn test_settings(temp_dir: &TempDir) -> SwarmSettings {
    let root = temp_dir.path().join("tmp");
    fs::create_dir_all(&root).unwrap();

    SwarmSettings {
        temp_root: Some(root),
        keygen_command: "true".to_string(),
        poll_interval_ms: 10,
        sweep_processes: false,
        ..Default::default()
    }
}

/// A run whose credentials are already provisioned, built without
/// capability discovery.
pub(crate) fn test_run(temp_dir: &TempDir, options: RunOptions) -> FleetRun {
    let settings = test_settings(temp_dir);
    let pki_dir = settings.temp_root().join("mswarm-pki-test");
    fs::create_dir_all(&pki_dir).unwrap();

    // Keep-list handling is exercised through `options`; discovery is bypassed.
    let mut run = FleetRun::new(RunOptions::default(), settings).unwrap();
    run.options = options;
    run.credential_dir = Some(pki_dir);
    run.user = "tester".to_string();
    run
}

/// Stand-in agent. Records its arguments in `<dir>/argv`, writes its pid to
/// the `--pid-file` argument and idles until signalled.
pub(crate) fn fake_agent(temp_dir: &TempDir) -> PathBuf {
    write_script(
        temp_dir,
        "fake-minion",
        "#!/bin/sh\n\
         # -c <dir> --pid-file <file> [-d | -l debug]\n\
         echo \"$@\" > \"$2/argv\"\n\
         echo $$ > \"$4\"\n\
         while :; do sleep 1; done\n",
    )
}

/// Stand-in credential tool. Writes a keypair and the key log.
pub(crate) fn fake_keygen(temp_dir: &TempDir) -> PathBuf {
    write_script(
        temp_dir,
        "fake-keygen",
        "#!/bin/sh\n\
         # -c <dir> --gen-keys minion --gen-keys-dir <dir> --key-logfile <log>\n\
         touch \"$6/minion.pem\" \"$6/minion.pub\"\n\
         echo generated > \"$8\"\n",
    )
}

fn write_script(temp_dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let bin = temp_dir.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    let path = bin.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Poll until `path` exists and is non-empty.
pub(crate) fn wait_for_file(path: &Path, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}
