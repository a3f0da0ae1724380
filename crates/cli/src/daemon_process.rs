// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Locating, starting and signalling the `orqd` process.

use crate::client::ClientError;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// Startup marker prefix the daemon appends to its log before anything else.
/// Full format: "--- orqd: starting (pid: 12345) ---"
const STARTUP_MARKER_PREFIX: &str = "--- orqd: starting (pid: ";

/// Start the daemon in the background, returning the child process handle
pub fn start_daemon_background() -> Result<std::process::Child, ClientError> {
    let orqd_path = find_orqd_binary();

    Command::new(&orqd_path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(format!("{}: {}", orqd_path.display(), e)))
}

/// Stop the daemon synchronously using SIGTERM + polling.
///
/// Used for the version-mismatch restart, which runs in a sync context.
pub fn stop_daemon_sync() {
    if let Ok(Some(pid)) = read_daemon_pid() {
        kill_signal("-15", pid);

        let timeout = crate::client::timeout_exit();
        if !wait_for_exit_sync(pid, timeout) {
            force_kill_daemon(pid);
            wait_for_exit_sync(pid, timeout);
        }
    }

    if let Ok(dir) = daemon_dir() {
        cleanup_stale_pid(&dir);
    }
}

fn wait_for_exit_sync(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    !process_exists(pid)
}

/// Wait for a process to exit
pub async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(crate::client::poll_interval()).await;
    }
    false
}

/// Find the orqd binary: ORQ_DAEMON_BINARY, a dev build, a sibling of the
/// CLI executable, then PATH.
pub fn find_orqd_binary() -> PathBuf {
    if let Some(path) = crate::env::daemon_binary() {
        return PathBuf::from(path);
    }

    let current_exe = std::env::current_exe().ok();

    // CARGO_MANIFEST_DIR only counts for a debug CLI, so a release CLI never
    // picks up a stale dev daemon.
    let is_debug_build = current_exe
        .as_ref()
        .and_then(|p| p.to_str())
        .is_some_and(|s| s.contains("target/debug"));

    if is_debug_build {
        if let Some(manifest_dir) = crate::env::cargo_manifest_dir() {
            let dev_path = PathBuf::from(manifest_dir)
                .parent()
                .and_then(|p| p.parent())
                .map(|p| p.join("target/debug/orqd"));
            if let Some(path) = dev_path {
                if path.exists() {
                    return path;
                }
            }
        }
    }

    if let Some(dir) = current_exe.as_deref().and_then(Path::parent) {
        let sibling = dir.join("orqd");
        if sibling.exists() {
            return sibling;
        }
    }

    PathBuf::from("orqd")
}

/// Socket path of the user-level daemon
pub fn daemon_socket() -> Result<PathBuf, ClientError> {
    Ok(daemon_dir()?.join("daemon.sock"))
}

/// State directory shared with the daemon
pub fn daemon_dir() -> Result<PathBuf, ClientError> {
    crate::env::state_dir()
}

/// Daemon log file
pub fn daemon_log() -> Result<PathBuf, ClientError> {
    Ok(daemon_dir()?.join("daemon.log"))
}

/// Remove a PID file left behind by a daemon that is gone.
pub fn cleanup_stale_pid(dir: &Path) {
    let pid_path = dir.join("daemon.pid");
    if pid_path.exists() {
        let _ = std::fs::remove_file(&pid_path);
    }
}

/// PID from the daemon lock file, if it exists and parses
pub fn read_daemon_pid() -> Result<Option<u32>, ClientError> {
    let pid_path = daemon_dir()?.join("daemon.pid");

    match std::fs::read_to_string(&pid_path) {
        Ok(content) => Ok(content.trim().parse::<u32>().ok()),
        Err(_) => Ok(None),
    }
}

/// Execute the kill command with the given signal and PID
fn kill_signal(signal: &str, pid: u32) -> bool {
    Command::new("kill")
        .args([signal, &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn process_exists(pid: u32) -> bool {
    kill_signal("-0", pid)
}

pub fn force_kill_daemon(pid: u32) -> bool {
    kill_signal("-9", pid)
}

/// Read the daemon log from the last startup marker, looking for errors.
pub fn read_startup_error() -> Option<String> {
    let content = std::fs::read_to_string(daemon_log().ok()?).ok()?;
    parse_startup_error(&content)
}

/// Errors logged since the most recent startup marker.
fn parse_startup_error(content: &str) -> Option<String> {
    let start_pos = content.rfind(STARTUP_MARKER_PREFIX)?;
    let startup_log = &content[start_pos..];

    let errors: Vec<&str> = startup_log
        .lines()
        .filter(|line| line.contains(" ERROR ") || line.contains("Failed to start"))
        .collect();

    if errors.is_empty() {
        return None;
    }

    // The synchronous write and the tracing line carry the same message
    let mut messages: Vec<&str> = Vec::new();
    for msg in errors
        .iter()
        .filter_map(|line| line.split_once("Failed to start daemon: ").map(|(_, msg)| msg))
    {
        if !messages.contains(&msg) {
            messages.push(msg);
        }
    }

    if messages.is_empty() {
        Some(errors.join("\n"))
    } else {
        Some(messages.join("\n"))
    }
}

/// Replace a generic startup failure with the daemon's own error, if logged.
pub fn wrap_with_startup_error(err: ClientError) -> ClientError {
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }

    match read_startup_error() {
        Some(startup_error) => ClientError::DaemonStartFailed(startup_error),
        None => err,
    }
}

/// Whether a Unix socket is accepting connections
pub fn probe_socket(socket_path: &Path) -> bool {
    std::os::unix::net::UnixStream::connect(socket_path).is_ok()
}

/// Remove a socket file nobody is listening on.
///
/// The PID file goes too when it names a dead process or cannot be parsed;
/// a live PID means a daemon is still starting up and owns both files.
pub fn cleanup_stale_socket() -> Result<(), ClientError> {
    let dir = daemon_dir()?;
    let socket_path = dir.join("daemon.sock");
    let pid_path = dir.join("daemon.pid");

    if !pid_path.exists() {
        let _ = std::fs::remove_file(&socket_path);
        return Ok(());
    }

    match read_daemon_pid()? {
        Some(pid) if process_exists(pid) => {}
        _ => {
            let _ = std::fs::remove_file(&socket_path);
            let _ = std::fs::remove_file(&pid_path);
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "daemon_process_tests.rs"]
mod tests;
