// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming child processes.
//!
//! stdout and stderr are drained concurrently by two reader tasks that
//! forward whole lines through one bounded channel. A slow consumer
//! applies backpressure to the readers, and through the pipes to the child.

use crate::signal::{self, Signalled};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Default capacity of the output line channel
pub const LINE_CHANNEL_CAPACITY: usize = 256;

/// Longest line forwarded in one piece; longer output is split
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Errors from process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("failed to wait for process: {0}")]
    Wait(std::io::Error),
}

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("STDOUT"),
            OutputStream::Stderr => f.write_str("STDERR"),
        }
    }
}

/// One line of child output, without its line terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// What to launch and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Shell-like rendering for logs
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// A launched child whose output is being drained
pub struct SpawnedProcess {
    child: Child,
    pid: Option<u32>,
    lines: mpsc::Receiver<OutputLine>,
}

impl SpawnedProcess {
    /// OS process id, if the child had not already been reaped
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Next output line; `None` once both pipes are closed.
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        self.lines.recv().await
    }

    /// Wait for the child to exit.
    pub async fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        self.child.wait().await.map_err(ProcessError::Wait)
    }

    /// SIGTERM the child, escalating to SIGKILL after `grace`.
    ///
    /// Output keeps flowing until the pipes close, so callers drain and
    /// [`wait`](Self::wait) as usual afterwards.
    pub async fn terminate(&mut self, grace: Duration) {
        let Some(pid) = self.pid else {
            return;
        };
        match signal::terminate(pid).await {
            Ok(Signalled::Delivered) => {
                tokio::spawn(async move {
                    signal::kill_after_grace(pid, grace).await;
                });
            }
            Ok(Signalled::NotFound) => {}
            Err(e) => {
                tracing::warn!(pid, error = %e, "SIGTERM failed, killing child");
                if let Err(e) = self.child.start_kill() {
                    tracing::warn!(pid, error = %e, "failed to kill child");
                }
            }
        }
    }
}

/// Launch `spec` with piped output and start draining it.
///
/// The child is killed if the returned handle is dropped before exit.
pub fn spawn_streaming(
    spec: &ProcessSpec,
    capacity: usize,
) -> Result<SpawnedProcess, ProcessError> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: spec.program.display().to_string(),
        source,
    })?;
    let pid = child.id();

    let (tx, rx) = mpsc::channel(capacity.max(1));
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump(stdout, OutputStream::Stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump(stderr, OutputStream::Stderr, tx.clone()));
    }
    drop(tx);

    Ok(SpawnedProcess {
        child,
        pid,
        lines: rx,
    })
}

/// Forward lines from one pipe until EOF or until the receiver is gone.
///
/// Lines longer than [`MAX_LINE_BYTES`] are split, so a child that never
/// writes a newline holds at most one chunk in memory.
async fn pump<R>(reader: R, stream: OutputStream, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        let chunk = match reader.fill_buf().await {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(%stream, error = %e, "output read failed");
                break;
            }
        };
        if chunk.is_empty() {
            if !buf.is_empty() {
                send_line(&tx, stream, &mut buf).await;
            }
            break;
        }

        let room = MAX_LINE_BYTES - buf.len();
        let window = &chunk[..chunk.len().min(room)];
        let (taken, complete) = match window.iter().position(|&b| b == b'\n') {
            Some(newline) => (newline + 1, true),
            None => (window.len(), window.len() == room),
        };
        buf.extend_from_slice(&window[..taken]);
        reader.consume(taken);

        if complete && !send_line(&tx, stream, &mut buf).await {
            break;
        }
    }
}

/// Send `buf` as one line and clear it. False once the receiver is gone.
async fn send_line(tx: &mpsc::Sender<OutputLine>, stream: OutputStream, buf: &mut Vec<u8>) -> bool {
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    let line = OutputLine {
        stream,
        text: String::from_utf8_lossy(buf).into_owned(),
    };
    buf.clear();
    tx.send(line).await.is_ok()
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
