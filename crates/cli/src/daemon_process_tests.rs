// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use tempfile::tempdir;

#[test]
fn parse_startup_error_reads_only_latest_attempt() {
    let log = "\
--- orqd: starting (pid: 100) ---
ERROR Failed to start daemon: Store error: old failure
--- orqd: starting (pid: 200) ---
2026-03-10T08:00:00Z  INFO orqd: Starting daemon
ERROR Failed to start daemon: Settings invalid
2026-03-10T08:00:00Z ERROR orqd: Failed to start daemon: Settings invalid
";

    let err = parse_startup_error(log);

    assert_eq!(err.as_deref(), Some("Settings invalid"));
}

#[test]
fn parse_startup_error_none_without_errors() {
    let log = "\
--- orqd: starting (pid: 200) ---
2026-03-10T08:00:00Z  INFO orqd: Daemon ready
";

    assert_eq!(parse_startup_error(log), None);
}

#[test]
fn parse_startup_error_none_without_marker() {
    assert_eq!(
        parse_startup_error("ERROR Failed to start daemon: boom\n"),
        None
    );
}

#[test]
fn parse_startup_error_keeps_unrecognized_error_lines() {
    let log = "\
--- orqd: starting (pid: 7) ---
2026-03-10T08:00:00Z ERROR orqd::listener: socket exploded
";

    let err = parse_startup_error(log).unwrap();

    assert!(err.contains("socket exploded"), "{err}");
}

#[test]
#[serial]
fn read_daemon_pid_parses_lock_file() {
    let dir = tempdir().unwrap();
    std::env::set_var("ORQ_STATE_DIR", dir.path());

    assert_eq!(read_daemon_pid().unwrap(), None);

    std::fs::write(dir.path().join("daemon.pid"), "4242\n").unwrap();
    assert_eq!(read_daemon_pid().unwrap(), Some(4242));

    std::fs::write(dir.path().join("daemon.pid"), "garbage").unwrap();
    assert_eq!(read_daemon_pid().unwrap(), None);

    std::env::remove_var("ORQ_STATE_DIR");
}

#[test]
#[serial]
fn cleanup_stale_socket_removes_files_of_dead_daemon() {
    let dir = tempdir().unwrap();
    std::env::set_var("ORQ_STATE_DIR", dir.path());
    let socket = dir.path().join("daemon.sock");
    let pid = dir.path().join("daemon.pid");
    std::fs::write(&socket, "").unwrap();
    std::fs::write(&pid, "not-a-pid").unwrap();

    cleanup_stale_socket().unwrap();

    assert!(!socket.exists());
    assert!(!pid.exists());
    std::env::remove_var("ORQ_STATE_DIR");
}

#[test]
#[serial]
fn cleanup_stale_socket_keeps_files_of_live_daemon() {
    let dir = tempdir().unwrap();
    std::env::set_var("ORQ_STATE_DIR", dir.path());
    let socket = dir.path().join("daemon.sock");
    let pid = dir.path().join("daemon.pid");
    std::fs::write(&socket, "").unwrap();
    // This test process stands in for a daemon that is still starting
    std::fs::write(&pid, std::process::id().to_string()).unwrap();

    cleanup_stale_socket().unwrap();

    assert!(socket.exists());
    assert!(pid.exists());
    std::env::remove_var("ORQ_STATE_DIR");
}

#[test]
#[serial]
fn daemon_binary_env_override_wins() {
    std::env::set_var("ORQ_DAEMON_BINARY", "/opt/orq/bin/orqd");

    assert_eq!(find_orqd_binary(), PathBuf::from("/opt/orq/bin/orqd"));

    std::env::remove_var("ORQ_DAEMON_BINARY");
}

#[test]
fn process_exists_for_self() {
    assert!(process_exists(std::process::id()));
}
