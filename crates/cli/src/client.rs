// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::client_lifecycle::log_connection_error;
use crate::daemon_process::{
    cleanup_stale_socket, daemon_dir, daemon_socket, probe_socket, read_startup_error,
    start_daemon_background, stop_daemon_sync, wrap_with_startup_error,
};

use orq_core::{Event, Job, JobConfig, JobId, Run, RunId};
use orq_daemon::protocol::{self, ProtocolError};
use orq_daemon::{Query, Request, Response, RunSummary};
use thiserror::Error;
use tokio::net::UnixStream;

/// Version this CLI expects the daemon to report
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Timeout for IPC requests
pub fn timeout_ipc() -> Duration {
    crate::env::timeout_ipc_ms().unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for the daemon to start
pub fn timeout_connect() -> Duration {
    crate::env::timeout_connect_ms().unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for a process to exit
pub fn timeout_exit() -> Duration {
    crate::env::timeout_exit_ms().unwrap_or(Duration::from_secs(2))
}

/// Polling interval for connection retries
pub fn poll_interval() -> Duration {
    crate::env::connect_poll_ms().unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("Connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The daemon refused the request; the message is shown as-is
    #[error("{0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,
}

impl ClientError {
    /// Whether the error means nobody is listening on the socket
    pub fn is_not_running(&self) -> bool {
        match self {
            ClientError::DaemonNotRunning => true,
            ClientError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound
            ),
            _ => false,
        }
    }
}

/// Daemon status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonStatus {
    pub uptime_secs: u64,
    pub jobs: usize,
    pub runs_active: usize,
    pub slots_free: usize,
}

/// Outcome of a workspace reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceResetOutcome {
    pub removed: usize,
    pub failed: usize,
}

/// Map a response to `T`, turning daemon errors into `Rejected`.
macro_rules! expect_response {
    ($response:expr, $pattern:pat => $value:expr) => {
        match $response {
            $pattern => Ok($value),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    };
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// For action commands: auto-start with version check, max 1 restart per process.
    ///
    /// Action commands mutate state and are operator-initiated (add, run,
    /// stop, reset), so a missing daemon is started on demand.
    pub fn for_action() -> Result<Self, ClientError> {
        static RESTARTED: AtomicBool = AtomicBool::new(false);

        if !RESTARTED.load(Ordering::SeqCst) {
            let version_path = daemon_dir()?.join("daemon.version");
            if let Ok(daemon_version) = std::fs::read_to_string(&version_path) {
                if daemon_version.trim() != CLI_VERSION {
                    // Marked before stopping so a failed restart is not retried
                    RESTARTED.store(true, Ordering::SeqCst);
                    eprintln!(
                        "warn: daemon version {} does not match cli version {}, restarting daemon",
                        daemon_version.trim(),
                        CLI_VERSION
                    );
                    stop_daemon_sync();
                }
            }
        }

        Self::connect_or_start()
    }

    /// For query commands: connect only, no restart.
    ///
    /// If the daemon is not running there is nothing to query.
    pub fn for_query() -> Result<Self, ClientError> {
        Self::connect()
    }

    /// Connect to the daemon, starting it in the background if needed
    pub fn connect_or_start() -> Result<Self, ClientError> {
        match Self::connect() {
            Ok(client) => {
                // A crashed daemon leaves its socket file behind
                if probe_socket(&client.socket_path) {
                    Ok(client)
                } else {
                    cleanup_stale_socket()?;
                    let child = start_daemon_background()?;
                    Self::connect_with_retry(timeout_connect(), child)
                }
            }
            Err(ClientError::DaemonNotRunning) => {
                let child = start_daemon_background()?;
                Self::connect_with_retry(timeout_connect(), child)
            }
            Err(e) => Err(wrap_with_startup_error(e)),
        }
    }

    /// Connect to an existing daemon (no auto-start)
    pub fn connect() -> Result<Self, ClientError> {
        let socket_path = daemon_socket()?;

        if !socket_path.exists() {
            let err = ClientError::DaemonNotRunning;
            log_connection_error(&err);
            return Err(err);
        }

        Ok(Self { socket_path })
    }

    /// Wait for a freshly spawned daemon's socket, watching for early exit.
    fn connect_with_retry(
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Ok(Some(status)) = child.try_wait() {
                // The log may lag the exit slightly
                let poll_start = Instant::now();
                while poll_start.elapsed() < timeout_exit() {
                    if let Some(err) = read_startup_error() {
                        return Err(ClientError::DaemonStartFailed(err));
                    }
                    std::thread::sleep(poll_interval());
                }
                return Err(ClientError::DaemonStartFailed(format!(
                    "exited with {}",
                    status
                )));
            }

            match Self::connect() {
                Ok(client) if probe_socket(&client.socket_path) => return Ok(client),
                Ok(_) | Err(ClientError::DaemonNotRunning) => {
                    std::thread::sleep(poll_interval());
                }
                Err(e) => return Err(wrap_with_startup_error(e)),
            }
        }

        Err(wrap_with_startup_error(ClientError::DaemonStartTimeout))
    }

    /// Send a request and receive a response with specific timeouts
    async fn send_with_timeout(
        &self,
        request: &Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(request)?;
        tokio::time::timeout(write_timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes =
            tokio::time::timeout(read_timeout, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??;

        Ok(protocol::decode(&response_bytes)?)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        match self
            .send_with_timeout(request, timeout_ipc(), timeout_ipc())
            .await
        {
            Ok(response) => Ok(response),
            Err(e) => {
                log_connection_error(&e);
                Err(e)
            }
        }
    }

    async fn query(&self, query: Query) -> Result<Response, ClientError> {
        self.send(&Request::Query { query }).await
    }

    // -- Daemon ----------------------------------------------------------------

    pub async fn status(&self) -> Result<DaemonStatus, ClientError> {
        expect_response!(self.send(&Request::Status).await?,
            Response::Status { uptime_secs, jobs, runs_active, slots_free } => DaemonStatus {
                uptime_secs,
                jobs,
                runs_active,
                slots_free,
            }
        )
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        expect_response!(self.send(&Request::Shutdown).await?,
            Response::Ok | Response::ShuttingDown => ())
    }

    /// Daemon version via the Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        let request = Request::Hello {
            version: CLI_VERSION.to_string(),
        };
        expect_response!(self.send(&request).await?, Response::Hello { version } => version)
    }

    // -- Queries ---------------------------------------------------------------

    pub async fn list_jobs(&self) -> Result<Vec<Job>, ClientError> {
        expect_response!(self.query(Query::ListJobs).await?, Response::Jobs { jobs } => jobs)
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<Option<Job>, ClientError> {
        expect_response!(self.query(Query::GetJob { job_id }).await?,
            Response::Job { job } => job.map(|b| *b))
    }

    /// Runs of a job, newest first
    pub async fn list_runs(
        &self,
        job_id: JobId,
        limit: usize,
    ) -> Result<Vec<RunSummary>, ClientError> {
        expect_response!(self.query(Query::ListRuns { job_id, limit }).await?,
            Response::Runs { runs } => runs)
    }

    /// A run including its log
    pub async fn get_run(&self, run_id: RunId) -> Result<Option<Run>, ClientError> {
        expect_response!(self.query(Query::GetRun { run_id }).await?,
            Response::Run { run } => run.map(|b| *b))
    }

    pub async fn running_runs(&self) -> Result<Vec<RunSummary>, ClientError> {
        expect_response!(self.query(Query::RunningRuns).await?,
            Response::Runs { runs } => runs)
    }

    pub async fn list_events(
        &self,
        job_id: Option<JobId>,
        limit: usize,
    ) -> Result<Vec<Event>, ClientError> {
        expect_response!(self.query(Query::ListEvents { job_id, limit }).await?,
            Response::Events { events } => events)
    }

    // -- Actions ---------------------------------------------------------------

    /// Create a job (`job_id` is `None`) or replace an existing job's configuration
    pub async fn upsert_job(
        &self,
        job_id: Option<JobId>,
        config: JobConfig,
    ) -> Result<Job, ClientError> {
        let request = Request::JobUpsert {
            job_id,
            config,
            actor: crate::env::actor(),
        };
        expect_response!(self.send(&request).await?, Response::JobSaved { job } => *job)
    }

    pub async fn set_paused(&self, job_id: JobId, paused: bool) -> Result<Job, ClientError> {
        let request = Request::JobSetPaused {
            job_id,
            paused,
            actor: crate::env::actor(),
        };
        expect_response!(self.send(&request).await?, Response::JobSaved { job } => *job)
    }

    pub async fn set_active(&self, job_id: JobId, active: bool) -> Result<Job, ClientError> {
        let request = Request::JobSetActive {
            job_id,
            active,
            actor: crate::env::actor(),
        };
        expect_response!(self.send(&request).await?, Response::JobSaved { job } => *job)
    }

    /// Start a manual run, returning its id
    pub async fn run_job(&self, job_id: JobId) -> Result<RunId, ClientError> {
        let request = Request::JobRun {
            job_id,
            actor: crate::env::actor(),
        };
        expect_response!(self.send(&request).await?, Response::RunStarted { run_id, .. } => run_id)
    }

    pub async fn stop_run(&self, run_id: RunId) -> Result<(RunSummary, String), ClientError> {
        let request = Request::RunStop {
            run_id,
            actor: crate::env::actor(),
        };
        expect_response!(self.send(&request).await?,
            Response::RunStopped { run, note } => (run, note))
    }

    pub async fn stop_job(&self, job_id: JobId) -> Result<(RunSummary, String), ClientError> {
        let request = Request::JobStop {
            job_id,
            actor: crate::env::actor(),
        };
        expect_response!(self.send(&request).await?,
            Response::RunStopped { run, note } => (run, note))
    }

    pub async fn reset_workspace(
        &self,
        job_id: JobId,
        keep: Vec<String>,
    ) -> Result<WorkspaceResetOutcome, ClientError> {
        let request = Request::WorkspaceReset {
            job_id,
            keep,
            actor: crate::env::actor(),
        };
        expect_response!(self.send(&request).await?,
            Response::WorkspaceReset { removed, failed } => {
                WorkspaceResetOutcome { removed, failed }
            })
    }

    /// Delete a job's isolated environment; `true` if one existed
    pub async fn reset_environment(&self, job_id: JobId) -> Result<bool, ClientError> {
        let request = Request::EnvironmentReset {
            job_id,
            actor: crate::env::actor(),
        };
        expect_response!(self.send(&request).await?,
            Response::EnvironmentReset { existed } => existed)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
