// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Signal handling of the `logbench` binary.
//!
//! The forwarders record their pid and sleep; the test signals logbench in
//! the middle of a measurement window and checks nothing it spawned is left.

use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::TempDir;

const DUMMER: &str = r#"
case "$1" in
  start) ;;
  stop) echo "Dummer 4242 not running" ;;
esac
"#;

const FLUENTD: &str = r#"
echo $$ >> "$(dirname "$0")/pids"
exec sleep 300
"#;

fn write_fixture(dir: &TempDir) -> std::path::PathBuf {
    std::fs::write(dir.path().join("dummer.sh"), DUMMER).expect("Failed to write dummer");
    std::fs::write(dir.path().join("fluentd.sh"), FLUENTD).expect("Failed to write fluentd");

    let root = dir.path().display();
    let config = dir.path().join("logbench.yaml");
    std::fs::write(
        &config,
        format!(
            r#"
generator:
  command: [sh, {root}/dummer.sh]
  config: dummer.conf
agent:
  command: [sh, {root}/fluentd.sh]
  config: agent.conf
receiver:
  command: [sh, {root}/fluentd.sh]
  config: receiver.conf
measurement:
  window_secs: 60
"#,
            root = root
        ),
    )
    .expect("Failed to write config");
    config
}

fn wait_for_pids(dir: &TempDir, count: usize) -> Vec<i32> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let pids: Vec<i32> = std::fs::read_to_string(dir.path().join("pids"))
            .unwrap_or_default()
            .lines()
            .filter_map(|l| l.trim().parse().ok())
            .collect();
        if pids.len() >= count || Instant::now() > deadline {
            return pids;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Start `logbench run`, deliver `signal` once both forwarders are up, and
/// return the exit status plus the forwarder pids still alive afterwards.
fn run_and_signal(subcommand: &[&str], signal: Signal) -> (ExitStatus, Vec<i32>) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_fixture(&dir);

    let mut child = Command::new(env!("CARGO_BIN_EXE_logbench"))
        .arg("-c")
        .arg(&config)
        .args(subcommand)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn logbench");

    let pids = wait_for_pids(&dir, 2);
    assert_eq!(pids.len(), 2, "forwarders did not start");

    kill(Pid::from_raw(child.id() as i32), signal).expect("Failed to signal logbench");
    let status = child.wait().expect("Failed to wait for logbench");

    let alive: Vec<i32> = pids
        .into_iter()
        .filter(|&pid| kill(Pid::from_raw(pid), None) != Err(Errno::ESRCH))
        .collect();
    // Do not leak sleepers if the assertion below fails
    for &pid in &alive {
        let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
    }
    (status, alive)
}

#[test]
fn test_sigterm_stops_forwarders() {
    let (status, alive) = run_and_signal(&["run"], Signal::SIGTERM);
    assert_eq!(status.code(), Some(143));
    assert!(alive.is_empty(), "orphaned forwarders: {:?}", alive);
}

#[test]
fn test_sighup_stops_forwarders() {
    let (status, alive) = run_and_signal(&["run"], Signal::SIGHUP);
    assert_eq!(status.code(), Some(129));
    assert!(alive.is_empty(), "orphaned forwarders: {:?}", alive);
}

#[test]
fn test_sigint_stops_forwarders() {
    let (status, alive) = run_and_signal(&["run"], Signal::SIGINT);
    assert_eq!(status.code(), Some(130));
    assert!(alive.is_empty(), "orphaned forwarders: {:?}", alive);
}

#[test]
fn test_sigterm_during_single_measurement() {
    let (status, alive) = run_and_signal(&["measure", "--rate", "1000"], Signal::SIGTERM);
    assert_eq!(status.code(), Some(143));
    assert!(alive.is_empty(), "orphaned forwarders: {:?}", alive);
}
