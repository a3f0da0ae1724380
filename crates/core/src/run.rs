// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run records: one execution attempt of a job.

use crate::job::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Identifier of a run, allocated by the store.
    pub struct RunId;
}

/// Run status.
///
/// `Running` is the only non-terminal state; there are no transitions out of
/// `Success` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    Scheduled,
    Manual,
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerMode::Scheduled => f.write_str("scheduled"),
            TriggerMode::Manual => f.write_str("manual"),
        }
    }
}

/// One execution attempt of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub job_id: JobId,
    pub status: RunStatus,
    pub trigger: TriggerMode,
    /// Operator who triggered the run (None for the scheduler)
    pub actor: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Set iff `status` is terminal
    pub finished_at: Option<DateTime<Utc>>,
    pub log: String,
    /// OS process id of the child; may be stale once the run is terminal
    pub external_pid: Option<u32>,
    pub exit_code: Option<i32>,
}

impl Run {
    pub fn open(
        id: RunId,
        job_id: JobId,
        trigger: TriggerMode,
        actor: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job_id,
            status: RunStatus::Running,
            trigger,
            actor,
            started_at: now,
            finished_at: None,
            log: String::new(),
            external_pid: None,
            exit_code: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// Move to a terminal state. Returns false if the run was already terminal.
    pub fn finalize(
        &mut self,
        status: RunStatus,
        exit_code: Option<i32>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.exit_code = exit_code;
        self.finished_at = Some(now);
        true
    }

    /// Append log text, keeping at most `max_chars` characters.
    pub fn append_log(&mut self, text: &str, max_chars: usize) {
        self.log.push_str(text);
        cap_log(&mut self.log, max_chars);
    }
}

/// Drop the oldest characters of `log` so that at most `max_chars` remain.
///
/// A `max_chars` of zero disables the cap.
pub fn cap_log(log: &mut String, max_chars: usize) {
    if max_chars == 0 || log.len() <= max_chars {
        return;
    }
    let total = log.chars().count();
    if total <= max_chars {
        return;
    }
    let excess = total - max_chars;
    if let Some((cut, _)) = log.char_indices().nth(excess) {
        log.drain(..cut);
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
