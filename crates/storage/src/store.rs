// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job store interface and its WAL-backed implementation

use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::{MaterializedState, Pruned, Retention, StoreOp};
use crate::wal::{Wal, WalError};
use chrono::{DateTime, Utc};
use orq_core::{Event, Job, JobId, NewEvent, Run, RunId, RunStatus, TriggerMode};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("run not found: {0}")]
    RunNotFound(RunId),
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Outcome of [`JobStore::open_run`]
#[derive(Debug, Clone, PartialEq)]
pub enum OpenRun {
    Opened(Run),
    /// The job already has a run in `running` state
    Busy(RunId),
}

/// Persistence interface for jobs, runs and the event log.
///
/// Every mutation is atomic with respect to other callers.
pub trait JobStore: Send + Sync + 'static {
    /// Allocate an id and insert the job built from it.
    fn create_job(&self, build: &dyn Fn(JobId) -> Job) -> Result<Job, StoreError>;

    /// Replace a stored job.
    fn save_job(&self, job: &Job) -> Result<(), StoreError>;

    fn job(&self, id: JobId) -> Option<Job>;

    fn jobs(&self) -> Vec<Job>;

    /// Active, unpaused jobs with `next_due <= now`
    fn due_jobs(&self, now: DateTime<Utc>) -> Vec<Job>;

    /// Active, paused jobs with `next_due <= now`
    fn paused_due_jobs(&self, now: DateTime<Utc>) -> Vec<Job>;

    /// Inactive jobs still carrying a `next_due <= now`
    fn stale_inactive_jobs(&self, now: DateTime<Utc>) -> Vec<Job>;

    /// Set `next_due` of the job `seen` was read from, unless the job has
    /// changed since. Returns false, writing nothing, if it has.
    fn advance_next_due(
        &self,
        seen: &Job,
        next_due: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Open a `running` run unless the job already has one.
    ///
    /// The check and the insert happen under one lock, so concurrent
    /// callers can never both open a run for the same job.
    fn open_run(
        &self,
        job_id: JobId,
        trigger: TriggerMode,
        actor: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<OpenRun, StoreError>;

    fn set_run_pid(&self, run_id: RunId, pid: u32) -> Result<(), StoreError>;

    /// Append to the run log, dropping the oldest text beyond `max_chars`.
    fn append_run_log(&self, run_id: RunId, text: &str, max_chars: usize)
        -> Result<(), StoreError>;

    /// Move a run to a terminal state. Returns false if it already was.
    fn finalize_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        exit_code: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    fn run(&self, id: RunId) -> Option<Run>;

    /// Runs of a job, newest first
    fn runs_for_job(&self, job_id: JobId, limit: usize) -> Vec<Run>;

    fn running_run(&self, job_id: JobId) -> Option<Run>;

    fn running_runs(&self) -> Vec<Run>;

    fn record_event(&self, event: NewEvent, now: DateTime<Utc>) -> Result<Event, StoreError>;

    /// Events newest first, optionally restricted to one job
    fn events(&self, job_id: Option<JobId>, limit: usize) -> Vec<Event>;

    /// Drop finished runs and events beyond `retention`.
    fn prune(&self, retention: Retention) -> Result<Pruned, StoreError>;
}

struct Inner {
    state: MaterializedState,
    wal: Option<Wal>,
}

impl Inner {
    /// Log the op, then apply it.
    fn commit(&mut self, op: StoreOp) -> Result<(), StoreError> {
        if let Some(wal) = self.wal.as_mut() {
            wal.append(&op)?;
        }
        self.state.apply_op(&op);
        Ok(())
    }
}

/// [`JobStore`] over [`MaterializedState`], durable through a WAL and
/// periodic snapshots.
pub struct WalStore {
    inner: Mutex<Inner>,
    snapshot_path: Option<PathBuf>,
}

impl WalStore {
    /// Volatile store for tests and tools
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: MaterializedState::default(),
                wal: None,
            }),
            snapshot_path: None,
        }
    }

    /// Recover from `snapshot_path` plus the WAL entries after it.
    pub fn open(wal_path: &Path, snapshot_path: &Path) -> Result<Self, StoreError> {
        let (mut state, base_seq) = match Snapshot::load(snapshot_path)? {
            Some(snapshot) => {
                info!(seq = snapshot.seq, "loaded snapshot");
                (snapshot.state, snapshot.seq)
            }
            None => (MaterializedState::default(), 0),
        };

        let wal = Wal::open(wal_path, base_seq)?;
        let entries = wal.entries_after(base_seq)?;
        let replayed = entries.len();
        for entry in entries {
            state.apply_op(&entry.op);
        }
        info!(
            replayed,
            jobs = state.jobs.len(),
            runs = state.runs.len(),
            "recovered store state"
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                state,
                wal: Some(wal),
            }),
            snapshot_path: Some(snapshot_path.to_owned()),
        })
    }

    /// Group-commit buffered ops if the interval elapsed or the buffer is full.
    pub fn flush_if_needed(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(wal) = inner.wal.as_mut() {
            if wal.needs_flush() {
                wal.flush()?;
            }
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(wal) = inner.wal.as_mut() {
            wal.flush()?;
        }
        Ok(())
    }

    /// Write a snapshot and drop the WAL entries it covers.
    ///
    /// Returns the checkpointed sequence, or `None` for in-memory stores.
    pub fn checkpoint(&self) -> Result<Option<u64>, StoreError> {
        let Some(snapshot_path) = self.snapshot_path.as_deref() else {
            return Ok(None);
        };

        let (seq, state) = {
            let mut inner = self.inner.lock();
            let Some(wal) = inner.wal.as_mut() else {
                return Ok(None);
            };
            wal.flush()?;
            let seq = wal.write_seq();
            (seq, inner.state.clone())
        };

        // The snapshot must be on disk before the WAL forgets anything
        Snapshot::new(seq, state).save(snapshot_path)?;

        let mut inner = self.inner.lock();
        if let Some(wal) = inner.wal.as_mut() {
            wal.truncate_before(seq)?;
        }
        Ok(Some(seq))
    }

    /// Copy of the full state
    pub fn state(&self) -> MaterializedState {
        self.inner.lock().state.clone()
    }
}

impl JobStore for WalStore {
    fn create_job(&self, build: &dyn Fn(JobId) -> Job) -> Result<Job, StoreError> {
        let mut inner = self.inner.lock();
        let job = build(inner.state.next_job_id());
        inner.commit(StoreOp::JobSaved { job: job.clone() })?;
        Ok(job)
    }

    fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.jobs.contains_key(&job.id) {
            return Err(StoreError::JobNotFound(job.id));
        }
        inner.commit(StoreOp::JobSaved { job: job.clone() })
    }

    fn job(&self, id: JobId) -> Option<Job> {
        self.inner.lock().state.jobs.get(&id).cloned()
    }

    fn jobs(&self) -> Vec<Job> {
        self.inner.lock().state.jobs.values().cloned().collect()
    }

    fn due_jobs(&self, now: DateTime<Utc>) -> Vec<Job> {
        self.select_jobs(|job| job.is_due(now))
    }

    fn paused_due_jobs(&self, now: DateTime<Utc>) -> Vec<Job> {
        self.select_jobs(|job| job.active && job.paused && overdue(job, now))
    }

    fn stale_inactive_jobs(&self, now: DateTime<Utc>) -> Vec<Job> {
        self.select_jobs(|job| !job.active && overdue(job, now))
    }

    fn advance_next_due(
        &self,
        seen: &Job,
        next_due: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(current) = inner.state.jobs.get(&seen.id) else {
            return Err(StoreError::JobNotFound(seen.id));
        };
        if current != seen {
            return Ok(false);
        }
        inner.commit(StoreOp::NextDueSet {
            job_id: seen.id,
            next_due,
            at,
        })?;
        Ok(true)
    }

    fn open_run(
        &self,
        job_id: JobId,
        trigger: TriggerMode,
        actor: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<OpenRun, StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.jobs.contains_key(&job_id) {
            return Err(StoreError::JobNotFound(job_id));
        }
        if let Some(running) = inner.state.running_run(job_id) {
            return Ok(OpenRun::Busy(running.id));
        }
        let run = Run::open(inner.state.next_run_id(), job_id, trigger, actor, now);
        inner.commit(StoreOp::RunOpened { run: run.clone() })?;
        Ok(OpenRun::Opened(run))
    }

    fn set_run_pid(&self, run_id: RunId, pid: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.runs.contains_key(&run_id) {
            return Err(StoreError::RunNotFound(run_id));
        }
        inner.commit(StoreOp::RunPidSet { run_id, pid })
    }

    fn append_run_log(
        &self,
        run_id: RunId,
        text: &str,
        max_chars: usize,
    ) -> Result<(), StoreError> {
        if text.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        if !inner.state.runs.contains_key(&run_id) {
            return Err(StoreError::RunNotFound(run_id));
        }
        inner.commit(StoreOp::RunLogAppended {
            run_id,
            text: text.to_string(),
            max_chars,
        })
    }

    fn finalize_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        exit_code: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(run) = inner.state.runs.get(&run_id) else {
            return Err(StoreError::RunNotFound(run_id));
        };
        if run.status.is_terminal() || !status.is_terminal() {
            return Ok(false);
        }
        inner.commit(StoreOp::RunFinalized {
            run_id,
            status,
            exit_code,
            at: now,
        })?;
        Ok(true)
    }

    fn run(&self, id: RunId) -> Option<Run> {
        self.inner.lock().state.runs.get(&id).cloned()
    }

    fn runs_for_job(&self, job_id: JobId, limit: usize) -> Vec<Run> {
        self.inner
            .lock()
            .state
            .runs_for_job(job_id)
            .take(limit)
            .cloned()
            .collect()
    }

    fn running_run(&self, job_id: JobId) -> Option<Run> {
        self.inner.lock().state.running_run(job_id).cloned()
    }

    fn running_runs(&self) -> Vec<Run> {
        self.inner
            .lock()
            .state
            .runs
            .values()
            .filter(|run| run.is_running())
            .cloned()
            .collect()
    }

    fn record_event(&self, event: NewEvent, now: DateTime<Utc>) -> Result<Event, StoreError> {
        let mut inner = self.inner.lock();
        let event = event.into_event(inner.state.next_event_id(), now);
        inner.commit(StoreOp::EventRecorded {
            event: event.clone(),
        })?;
        Ok(event)
    }

    fn events(&self, job_id: Option<JobId>, limit: usize) -> Vec<Event> {
        self.inner
            .lock()
            .state
            .events
            .iter()
            .rev()
            .filter(|event| job_id.is_none() || event.job_id == job_id)
            .take(limit)
            .cloned()
            .collect()
    }

    fn prune(&self, retention: Retention) -> Result<Pruned, StoreError> {
        let mut inner = self.inner.lock();
        let pruned = inner.state.prunable(&retention);
        if !pruned.is_empty() {
            inner.commit(StoreOp::HistoryPruned { retention })?;
        }
        Ok(pruned)
    }
}

impl WalStore {
    fn select_jobs(&self, pred: impl Fn(&Job) -> bool) -> Vec<Job> {
        self.inner
            .lock()
            .state
            .jobs
            .values()
            .filter(|job| pred(job))
            .cloned()
            .collect()
    }
}

fn overdue(job: &Job, now: DateTime<Utc>) -> bool {
    job.next_due.is_some_and(|due| due <= now)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
