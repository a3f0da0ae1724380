// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run records and their live logs

use chrono::SecondsFormat;
use orq_core::{Clock, JobId, RunId, RunStatus, TriggerMode};
use orq_storage::{JobStore, OpenRun, StoreError};
use std::sync::Arc;
use std::time::Duration;

/// Receives the output of an execution as it happens.
pub trait LogSink: Send {
    /// Append one timestamped line.
    fn line(&mut self, text: &str);

    /// Record the OS process id of the launched child.
    fn pid(&mut self, pid: u32);
}

/// How an execution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub exit_code: Option<i32>,
}

impl RunOutcome {
    pub fn success() -> Self {
        Self {
            status: RunStatus::Success,
            exit_code: Some(0),
        }
    }

    pub fn failed(exit_code: Option<i32>) -> Self {
        Self {
            status: RunStatus::Failed,
            exit_code,
        }
    }

    /// Exit code zero is success; anything else, including death by
    /// signal, is failure.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::success(),
            other => Self::failed(other),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Log buffering limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Minimum time between two flushes of a run's buffer
    pub flush_interval: Duration,
    /// Maximum stored log length; the oldest text is dropped first
    pub max_log_chars: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            max_log_chars: 100_000,
        }
    }
}

/// Opens runs and hands out their log writers.
#[derive(Clone)]
pub struct RunLedger<C: Clock> {
    store: Arc<dyn JobStore>,
    clock: C,
    config: LedgerConfig,
}

impl<C: Clock> RunLedger<C> {
    pub fn new(store: Arc<dyn JobStore>, clock: C, config: LedgerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Open a `running` run for the job unless one is already running.
    pub fn open(
        &self,
        job_id: JobId,
        trigger: TriggerMode,
        actor: Option<String>,
    ) -> Result<OpenRun, StoreError> {
        self.store.open_run(job_id, trigger, actor, self.clock.now())
    }

    /// Buffered writer for a run's log
    pub fn log(&self, run_id: RunId) -> RunLog<C> {
        RunLog {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            config: self.config,
            run_id,
            buffer: String::new(),
            last_flush_ms: self.clock.epoch_ms(),
        }
    }
}

fn stamp_line<C: Clock>(clock: &C, text: &str) -> String {
    format!(
        "[{}] {}\n",
        clock.now().to_rfc3339_opts(SecondsFormat::Secs, true),
        text
    )
}

/// Buffered log writer for one run.
///
/// Appends are kept in memory and written to the store at most once per
/// flush interval, or sooner when the buffer outgrows the log cap.
/// Store failures while appending are logged and dropped so that a full
/// disk never aborts a running job. Whatever is still buffered is
/// written when the writer is dropped.
pub struct RunLog<C: Clock> {
    store: Arc<dyn JobStore>,
    clock: C,
    config: LedgerConfig,
    run_id: RunId,
    buffer: String,
    last_flush_ms: u64,
}

impl<C: Clock> RunLog<C> {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Append raw text.
    pub fn append(&mut self, text: &str) {
        self.buffer.push_str(text);
        let cap = self.config.max_log_chars;
        let elapsed_ms = self.clock.epoch_ms().saturating_sub(self.last_flush_ms);
        if elapsed_ms >= self.config.flush_interval.as_millis() as u64
            || (cap > 0 && self.buffer.len() >= cap)
        {
            self.flush();
        }
    }

    /// Write buffered text to the store.
    pub fn flush(&mut self) {
        self.last_flush_ms = self.clock.epoch_ms();
        if self.buffer.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.buffer);
        if let Err(e) = self
            .store
            .append_run_log(self.run_id, &text, self.config.max_log_chars)
        {
            tracing::warn!(run_id = %self.run_id, error = %e, "failed to append run log");
        }
    }

    /// Flush and move the run to its terminal state.
    ///
    /// Returns false if the run had already been finalized, e.g. by a stop.
    pub fn finalize(&mut self, outcome: RunOutcome) -> Result<bool, StoreError> {
        self.flush();
        self.store.finalize_run(
            self.run_id,
            outcome.status,
            outcome.exit_code,
            self.clock.now(),
        )
    }
}

impl<C: Clock> LogSink for RunLog<C> {
    fn line(&mut self, text: &str) {
        let line = stamp_line(&self.clock, text);
        self.append(&line);
    }

    fn pid(&mut self, pid: u32) {
        if let Err(e) = self.store.set_run_pid(self.run_id, pid) {
            tracing::warn!(run_id = %self.run_id, pid, error = %e, "failed to record pid");
        }
    }
}

impl<C: Clock> Drop for RunLog<C> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
