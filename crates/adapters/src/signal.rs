// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal delivery to external processes by pid

use crate::subprocess::{run_with_timeout, SIGNAL_TIMEOUT};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// Grace period between SIGTERM and SIGKILL
pub const KILL_GRACE: Duration = Duration::from_secs(3);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of signalling a pid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signalled {
    Delivered,
    /// No such process; it had already exited
    NotFound,
}

async fn kill(signal: &str, pid: u32) -> Result<bool, String> {
    let mut cmd = Command::new("kill");
    cmd.args([signal, &pid.to_string()])
        .stdin(std::process::Stdio::null());
    let output = run_with_timeout(cmd, SIGNAL_TIMEOUT, "kill").await?;
    Ok(output.status.success())
}

/// Whether a process with this pid exists
pub async fn is_alive(pid: u32) -> bool {
    kill("-0", pid).await.unwrap_or(false)
}

/// Working directory of a live process, from `/proc`.
///
/// `None` when the process is gone, belongs to another user, or the
/// platform has no procfs.
pub fn process_cwd(pid: u32) -> Option<PathBuf> {
    std::fs::canonicalize(format!("/proc/{}/cwd", pid)).ok()
}

/// Send SIGTERM to `pid`.
pub async fn terminate(pid: u32) -> Result<Signalled, String> {
    if kill("-TERM", pid).await? {
        return Ok(Signalled::Delivered);
    }
    if is_alive(pid).await {
        Err(format!("kill -TERM {pid} was refused"))
    } else {
        Ok(Signalled::NotFound)
    }
}

/// Wait up to `grace` for `pid` to exit, then SIGKILL it.
///
/// Returns true if the process had to be killed.
pub async fn kill_after_grace(pid: u32, grace: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + grace;
    while tokio::time::Instant::now() < deadline {
        if !is_alive(pid).await {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    if !is_alive(pid).await {
        return false;
    }
    tracing::warn!(pid, "process ignored SIGTERM, sending SIGKILL");
    kill("-KILL", pid).await.unwrap_or(false)
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
