// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launches a job's entrypoint and streams its output into the run log

use crate::ledger::{LogSink, RunOutcome};
use orq_adapters::signal::KILL_GRACE;
use orq_adapters::{spawn_streaming, ProcessError, ProcessSpec, LINE_CHANNEL_CAPACITY};
use orq_core::{Job, RunId};
use std::path::{Component, Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that prevent a process from being launched
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid entrypoint '{0}': must be a relative path inside the workspace")]
    InvalidEntrypoint(String),
    #[error("entrypoint '{entrypoint}' not found in {workspace}")]
    EntrypointMissing {
        entrypoint: String,
        workspace: PathBuf,
    },
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("run was stopped before launch")]
    Stopped,
}

/// What to execute for one run
#[derive(Debug, Clone, Copy)]
pub struct Launch<'a> {
    pub job: &'a Job,
    pub run_id: RunId,
    pub workspace: &'a Path,
    pub interpreter: &'a Path,
}

/// Runs `<interpreter> <entrypoint>` inside the job workspace.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    channel_capacity: usize,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(LINE_CHANNEL_CAPACITY)
    }
}

impl ProcessRunner {
    pub fn new(channel_capacity: usize) -> Self {
        Self { channel_capacity }
    }

    /// Launch the job and drain its output into `sink` until it exits.
    ///
    /// A non-zero exit is a failed outcome, not an error. Errors mean the
    /// process never started, so no pid was recorded. Once `cancel` fires
    /// nothing is launched, and a live child is terminated.
    pub async fn run(
        &self,
        launch: Launch<'_>,
        sink: &mut dyn LogSink,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunnerError> {
        let entrypoint = &launch.job.entrypoint;
        let script = resolve_entrypoint(launch.workspace, entrypoint)?;

        let spec = ProcessSpec::new(launch.interpreter, launch.workspace)
            .arg(script.display().to_string())
            .env("PYTHONUNBUFFERED", "1")
            .env("PYTHONIOENCODING", "utf-8:replace")
            .env("ORQ_JOB_ID", launch.job.id.to_string())
            .env("ORQ_RUN_ID", launch.run_id.to_string())
            .env("ORQ_WORKSPACE", launch.workspace.display().to_string());

        sink.line(&format!("working directory: {}", launch.workspace.display()));
        sink.line(&format!("command: {}", spec.command_line()));

        if cancel.is_cancelled() {
            return Err(RunnerError::Stopped);
        }
        let mut child = spawn_streaming(&spec, self.channel_capacity)?;
        if let Some(pid) = child.pid() {
            sink.pid(pid);
        }
        tracing::info!(
            job_id = %launch.job.id,
            run_id = %launch.run_id,
            pid = ?child.pid(),
            "process started"
        );

        let mut stopping = false;
        loop {
            tokio::select! {
                line = child.next_line() => match line {
                    Some(line) => sink.line(&format!("{}: {}", line.stream, line.text)),
                    None => break,
                },
                _ = cancel.cancelled(), if !stopping => {
                    stopping = true;
                    sink.line("stop requested, terminating process");
                    child.terminate(KILL_GRACE).await;
                }
            }
        }
        let status = child.wait().await?;

        sink.line(&describe_exit(status));
        tracing::info!(
            job_id = %launch.job.id,
            run_id = %launch.run_id,
            code = ?status.code(),
            "process exited"
        );
        Ok(RunOutcome::from_exit_code(status.code()))
    }
}

/// Check that `entrypoint` names a file inside the workspace.
pub fn check_entrypoint(entrypoint: &str) -> Result<&Path, RunnerError> {
    let relative = Path::new(entrypoint);
    let contained = !entrypoint.trim().is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if contained {
        Ok(relative)
    } else {
        Err(RunnerError::InvalidEntrypoint(entrypoint.to_string()))
    }
}

/// Path of the entrypoint inside `workspace`, checked to exist.
pub fn resolve_entrypoint(workspace: &Path, entrypoint: &str) -> Result<PathBuf, RunnerError> {
    let script = workspace.join(check_entrypoint(entrypoint)?);
    if !script.is_file() {
        return Err(RunnerError::EntrypointMissing {
            entrypoint: entrypoint.to_string(),
            workspace: workspace.to_path_buf(),
        });
    }
    Ok(script)
}

fn describe_exit(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("process exited with code {}", code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("process terminated by signal {}", signal);
        }
    }
    "process exited without a code".to_string()
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
