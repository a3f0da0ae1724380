// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Due-job discovery and dispatch, one tick at a time

use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::event_log::EventLog;
use chrono::{DateTime, Utc};
use orq_adapters::EnvProvisioner;
use orq_core::{Clock, EventKind, Job, NewEvent, RunId, ScheduleZone, TriggerMode};
use orq_storage::{JobStore, StoreError};
use serde_json::json;
use std::sync::Arc;

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Runs started this tick
    pub dispatched: Vec<RunId>,
    /// Due jobs skipped because a run was still in progress
    pub busy: usize,
    /// Due jobs left for the next tick because every slot was taken
    pub saturated: usize,
    pub skipped_paused: usize,
    pub skipped_inactive: usize,
    pub errors: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Evaluates due jobs against the store and hands them to the dispatcher.
pub struct Scheduler<P, C: Clock> {
    store: Arc<dyn JobStore>,
    dispatcher: Dispatcher<P, C>,
    events: EventLog<C>,
    clock: C,
    zone: ScheduleZone,
}

impl<P, C> Scheduler<P, C>
where
    P: EnvProvisioner,
    C: Clock,
{
    pub fn new(
        store: Arc<dyn JobStore>,
        dispatcher: Dispatcher<P, C>,
        clock: C,
        zone: ScheduleZone,
    ) -> Self {
        Self {
            events: EventLog::new(Arc::clone(&store), clock.clone()),
            store,
            dispatcher,
            clock,
            zone,
        }
    }

    /// Consider every job whose due time has passed exactly once.
    ///
    /// Failures are recorded as `scheduler_error` events and never stop
    /// the remaining jobs from being considered.
    pub fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let mut report = TickReport::default();

        for job in self.store.stale_inactive_jobs(now) {
            let result = self.skip(&job, EventKind::ScheduleSkippedInactive, "job inactive", None);
            self.settle(&job, result, &mut report.skipped_inactive, &mut report.errors);
        }

        for job in self.store.paused_due_jobs(now) {
            let next_due = self.zone.next_slot_after(&job, now);
            let result = self.skip(&job, EventKind::ScheduleSkippedPaused, "job paused", next_due);
            self.settle(&job, result, &mut report.skipped_paused, &mut report.errors);
        }

        for job in self.store.due_jobs(now) {
            if let Err(e) = self.fire(&job, &mut report) {
                report.errors += 1;
                self.scheduler_error(&job, &e.to_string());
            }
        }

        report
    }

    fn fire(&self, job: &Job, report: &mut TickReport) -> Result<(), StoreError> {
        let now = self.clock.now();

        let run_id = match self.dispatcher.dispatch(job, TriggerMode::Scheduled, None) {
            Ok(DispatchOutcome::Started(dispatched)) => Some(dispatched.run.id),
            Ok(DispatchOutcome::Busy(run_id)) => {
                tracing::debug!(job_id = %job.id, %run_id, "job busy, not firing");
                report.busy += 1;
                return Ok(());
            }
            Ok(DispatchOutcome::Saturated) => {
                tracing::debug!(job_id = %job.id, "run pool saturated, retrying next tick");
                report.saturated += 1;
                return Ok(());
            }
            Err(e) => {
                report.errors += 1;
                self.scheduler_error(job, &format!("dispatch failed: {}", e));
                None
            }
        };

        // Operator edits made since `job` was read win over this advance
        let next_due = self.zone.next_due(job, now);
        let persisted = self.store.advance_next_due(job, next_due, now);
        if matches!(persisted, Ok(false)) {
            tracing::debug!(job_id = %job.id, "job changed during the tick, keeping its schedule");
        }

        if let Some(run_id) = run_id {
            report.dispatched.push(run_id);
            self.events.record_or_warn(
                NewEvent::new(EventKind::ScheduleFired, format!("scheduled run of '{}'", job.name))
                    .job(job.id)
                    .run(run_id)
                    .metadata(json!({ "due": job.next_due, "next_due": next_due })),
            );
        }
        persisted.map(|_| ())
    }

    fn skip(
        &self,
        job: &Job,
        kind: EventKind,
        reason: &str,
        next_due: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        if !self.store.advance_next_due(job, next_due, now)? {
            return Ok(());
        }
        self.events.record(
            NewEvent::new(kind, format!("{}, schedule not fired", reason))
                .job(job.id)
                .metadata(json!({ "due": job.next_due, "next_due": next_due })),
        )?;
        Ok(())
    }

    fn settle(
        &self,
        job: &Job,
        result: Result<(), StoreError>,
        counter: &mut usize,
        errors: &mut usize,
    ) {
        match result {
            Ok(()) => *counter += 1,
            Err(e) => {
                *errors += 1;
                self.scheduler_error(job, &e.to_string());
            }
        }
    }

    fn scheduler_error(&self, job: &Job, message: &str) {
        tracing::error!(job_id = %job.id, error = message, "scheduler error");
        self.events
            .record_or_warn(NewEvent::new(EventKind::SchedulerError, message).job(job.id));
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
