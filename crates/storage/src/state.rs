// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

use chrono::{DateTime, Utc};
use orq_core::{Event, EventId, Job, JobId, Run, RunId, RunStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// How much finished history the store keeps. A zero limit keeps everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    /// Finished runs kept per job, newest first. Running runs always stay.
    pub runs_per_job: usize,
    /// Events kept, newest first
    pub events: usize,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            runs_per_job: 200,
            events: 10_000,
        }
    }
}

/// Records a prune removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pruned {
    pub runs: usize,
    pub events: usize,
}

impl Pruned {
    pub fn is_empty(&self) -> bool {
        self.runs == 0 && self.events == 0
    }
}

/// A single durable mutation of the store.
///
/// Ops carry every value they need (ids, timestamps) so that replaying the
/// WAL reproduces exactly the state that was observed before a crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreOp {
    JobSaved {
        job: Job,
    },
    NextDueSet {
        job_id: JobId,
        next_due: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    RunOpened {
        run: Run,
    },
    RunPidSet {
        run_id: RunId,
        pid: u32,
    },
    RunLogAppended {
        run_id: RunId,
        text: String,
        max_chars: usize,
    },
    RunFinalized {
        run_id: RunId,
        status: RunStatus,
        exit_code: Option<i32>,
        at: DateTime<Utc>,
    },
    EventRecorded {
        event: Event,
    },
    HistoryPruned {
        retention: Retention,
    },
}

/// Complete store contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializedState {
    pub jobs: BTreeMap<JobId, Job>,
    pub runs: BTreeMap<RunId, Run>,
    pub events: Vec<Event>,
    #[serde(default)]
    last_job_id: u64,
    #[serde(default)]
    last_run_id: u64,
    #[serde(default)]
    last_event_id: u64,
}

impl MaterializedState {
    pub fn next_job_id(&self) -> JobId {
        JobId::new(self.last_job_id + 1)
    }

    pub fn next_run_id(&self) -> RunId {
        RunId::new(self.last_run_id + 1)
    }

    pub fn next_event_id(&self) -> EventId {
        EventId::new(self.last_event_id + 1)
    }

    /// The run of `job_id` currently in `running` state, if any
    pub fn running_run(&self, job_id: JobId) -> Option<&Run> {
        self.runs
            .values()
            .rev()
            .find(|run| run.job_id == job_id && run.is_running())
    }

    /// Runs of a job, newest first
    pub fn runs_for_job(&self, job_id: JobId) -> impl Iterator<Item = &Run> {
        self.runs.values().rev().filter(move |run| run.job_id == job_id)
    }

    /// What pruning to `retention` would remove
    pub fn prunable(&self, retention: &Retention) -> Pruned {
        Pruned {
            runs: self.expired_runs(retention.runs_per_job).len(),
            events: excess(self.events.len(), retention.events),
        }
    }

    fn expired_runs(&self, keep: usize) -> Vec<RunId> {
        if keep == 0 {
            return Vec::new();
        }
        let mut seen: HashMap<JobId, usize> = HashMap::new();
        self.runs
            .values()
            .rev()
            .filter(|run| !run.is_running())
            .filter_map(|run| {
                let count = seen.entry(run.job_id).or_default();
                *count += 1;
                (*count > keep).then_some(run.id)
            })
            .collect()
    }

    fn prune(&mut self, retention: &Retention) {
        for run_id in self.expired_runs(retention.runs_per_job) {
            self.runs.remove(&run_id);
        }
        let drop_events = excess(self.events.len(), retention.events);
        self.events.drain(..drop_events);
    }

    /// Apply a mutation.
    ///
    /// Application is total: ops that reference unknown records or try to
    /// leave a terminal state are ignored, so replay never fails.
    pub fn apply_op(&mut self, op: &StoreOp) {
        match op {
            StoreOp::JobSaved { job } => {
                self.last_job_id = self.last_job_id.max(job.id.get());
                self.jobs.insert(job.id, job.clone());
            }
            StoreOp::NextDueSet {
                job_id,
                next_due,
                at,
            } => {
                if let Some(job) = self.jobs.get_mut(job_id) {
                    job.next_due = *next_due;
                    job.updated_at = *at;
                }
            }
            StoreOp::RunOpened { run } => {
                self.last_run_id = self.last_run_id.max(run.id.get());
                self.runs.insert(run.id, run.clone());
            }
            StoreOp::RunPidSet { run_id, pid } => {
                if let Some(run) = self.runs.get_mut(run_id) {
                    run.external_pid = Some(*pid);
                }
            }
            StoreOp::RunLogAppended {
                run_id,
                text,
                max_chars,
            } => {
                if let Some(run) = self.runs.get_mut(run_id) {
                    run.append_log(text, *max_chars);
                }
            }
            StoreOp::RunFinalized {
                run_id,
                status,
                exit_code,
                at,
            } => {
                if let Some(run) = self.runs.get_mut(run_id) {
                    run.finalize(*status, *exit_code, *at);
                }
            }
            StoreOp::EventRecorded { event } => {
                self.last_event_id = self.last_event_id.max(event.id.get());
                self.events.push(event.clone());
            }
            StoreOp::HistoryPruned { retention } => self.prune(retention),
        }
    }
}

fn excess(len: usize, limit: usize) -> usize {
    if limit == 0 {
        0
    } else {
        len.saturating_sub(limit)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
