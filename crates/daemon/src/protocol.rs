// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC Protocol for daemon communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

use chrono::{DateTime, Utc};
use orq_core::{Event, Job, JobConfig, JobId, Run, RunId, RunStatus, TriggerMode};
use serde::{Deserialize, Serialize};

#[path = "protocol_wire.rs"]
mod wire;
pub use wire::{
    decode, encode, read_message, read_request, write_message, write_response, ProtocolError,
    DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};

/// Request from CLI to daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Get daemon status
    Status,

    /// Request daemon shutdown
    Shutdown,

    /// Query state
    Query { query: Query },

    /// Create a job (`job_id` absent) or replace an existing job's configuration
    JobUpsert {
        job_id: Option<JobId>,
        config: JobConfig,
        #[serde(default)]
        actor: Option<String>,
    },

    /// Pause or resume a job's schedule
    JobSetPaused {
        job_id: JobId,
        paused: bool,
        #[serde(default)]
        actor: Option<String>,
    },

    /// Activate or deactivate a job
    JobSetActive {
        job_id: JobId,
        active: bool,
        #[serde(default)]
        actor: Option<String>,
    },

    /// Start a run now, bypassing the schedule
    JobRun {
        job_id: JobId,
        #[serde(default)]
        actor: Option<String>,
    },

    /// Cancel a running run
    RunStop {
        run_id: RunId,
        #[serde(default)]
        actor: Option<String>,
    },

    /// Cancel whatever run of the job is in progress
    JobStop {
        job_id: JobId,
        #[serde(default)]
        actor: Option<String>,
    },

    /// Empty a job's workspace
    WorkspaceReset {
        job_id: JobId,
        /// Top-level entries to leave in place
        #[serde(default)]
        keep: Vec<String>,
        #[serde(default)]
        actor: Option<String>,
    },

    /// Delete a job's isolated environment
    EnvironmentReset {
        job_id: JobId,
        #[serde(default)]
        actor: Option<String>,
    },
}

/// Query types for reading daemon state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Query {
    ListJobs,
    GetJob { job_id: JobId },
    /// Runs of a job, newest first
    ListRuns { job_id: JobId, limit: usize },
    /// A run including its full log
    GetRun { run_id: RunId },
    ListEvents {
        #[serde(default)]
        job_id: Option<JobId>,
        limit: usize,
    },
    RunningRuns,
}

/// Response from daemon to CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Shutdown acknowledged
    ShuttingDown,

    /// Daemon status
    Status {
        uptime_secs: u64,
        jobs: usize,
        runs_active: usize,
        slots_free: usize,
    },

    /// Error response
    Error { message: String },

    Jobs { jobs: Vec<Job> },

    Job { job: Option<Box<Job>> },

    Runs { runs: Vec<RunSummary> },

    Run { run: Option<Box<Run>> },

    Events { events: Vec<Event> },

    /// Job created or updated
    JobSaved { job: Box<Job> },

    /// Manual run dispatched
    RunStarted { run_id: RunId, job_id: JobId },

    /// Run cancelled
    RunStopped { run: RunSummary, note: String },

    WorkspaceReset { removed: usize, failed: usize },

    EnvironmentReset { existed: bool },
}

/// Run without its log, for listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub id: RunId,
    pub job_id: JobId,
    pub status: RunStatus,
    pub trigger: TriggerMode,
    #[serde(default)]
    pub actor: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub external_pid: Option<u32>,
    /// Size of the captured log in characters
    #[serde(default)]
    pub log_chars: usize,
}

impl From<&Run> for RunSummary {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id,
            job_id: run.job_id,
            status: run.status,
            trigger: run.trigger,
            actor: run.actor.clone(),
            started_at: run.started_at,
            finished_at: run.finished_at,
            exit_code: run.exit_code,
            external_pid: run.external_pid,
            log_chars: run.log.chars().count(),
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
