// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-facing runtime: job configuration, manual control and resets

use crate::dispatch::{DispatchOutcome, Dispatched, Dispatcher, Executor};
use crate::error::RuntimeError;
use crate::event_log::EventLog;
use crate::handlers::HandlerRegistry;
use crate::ledger::{LedgerConfig, LogSink, RunOutcome};
use crate::runner::check_entrypoint;
use crate::scheduler::{Scheduler, TickReport};
use crate::workspace::{ResetReport, WorkspaceManager};
use orq_adapters::signal::{self, Signalled, KILL_GRACE};
use orq_adapters::EnvProvisioner;
use orq_core::{
    Clock, Event, EventKind, Job, JobConfig, JobId, JobKind, NewEvent, Run, RunId, Schedule,
    ScheduleError, ScheduleZone, TriggerMode,
};
use orq_storage::JobStore;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Parent of every `job_<id>` workspace
    pub workspaces_root: PathBuf,
    /// Folders created inside each workspace
    pub workspace_subdirs: Vec<String>,
    pub max_concurrent_runs: usize,
    pub ledger: LedgerConfig,
    /// Zone in which times of day are interpreted
    pub zone: ScheduleZone,
}

impl RuntimeConfig {
    pub fn new(workspaces_root: impl Into<PathBuf>) -> Self {
        Self {
            workspaces_root: workspaces_root.into(),
            workspace_subdirs: vec!["inputs".to_string(), "outputs".to_string()],
            max_concurrent_runs: 8,
            ledger: LedgerConfig::default(),
            zone: ScheduleZone::default(),
        }
    }
}

/// Runtime dependencies
pub struct RuntimeDeps<P> {
    pub store: Arc<dyn JobStore>,
    pub provisioner: P,
    pub handlers: HandlerRegistry,
}

/// Result of a stop request
#[derive(Debug, Clone)]
pub struct StopReport {
    pub run: Run,
    /// What happened to the process, as written to the run log
    pub note: String,
}

/// Coordinates the store, the scheduler and the run pool.
pub struct Runtime<P, C: Clock> {
    store: Arc<dyn JobStore>,
    workspaces: WorkspaceManager,
    provisioner: P,
    dispatcher: Dispatcher<P, C>,
    scheduler: Scheduler<P, C>,
    events: EventLog<C>,
    clock: C,
    zone: ScheduleZone,
}

impl<P, C> Runtime<P, C>
where
    P: EnvProvisioner,
    C: Clock,
{
    pub fn new(deps: RuntimeDeps<P>, clock: C, config: RuntimeConfig) -> Self {
        let workspaces = WorkspaceManager::new(config.workspaces_root, config.workspace_subdirs);
        let executor = Executor::new(
            Arc::clone(&deps.store),
            workspaces.clone(),
            deps.provisioner.clone(),
            deps.handlers,
            config.ledger,
            clock.clone(),
        );
        let dispatcher = Dispatcher::new(executor, config.max_concurrent_runs);
        let scheduler = Scheduler::new(
            Arc::clone(&deps.store),
            dispatcher.clone(),
            clock.clone(),
            config.zone,
        );
        Self {
            events: EventLog::new(Arc::clone(&deps.store), clock.clone()),
            store: deps.store,
            workspaces,
            provisioner: deps.provisioner,
            dispatcher,
            scheduler,
            clock,
            zone: config.zone,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Run slots not currently in use
    pub fn available_slots(&self) -> usize {
        self.dispatcher.available_slots()
    }

    /// Run one scheduler pass.
    pub fn tick(&self) -> TickReport {
        self.scheduler.tick()
    }

    // -- Queries --

    pub fn jobs(&self) -> Vec<Job> {
        self.store.jobs()
    }

    pub fn job(&self, job_id: JobId) -> Result<Job, RuntimeError> {
        self.store.job(job_id).ok_or(RuntimeError::JobNotFound(job_id))
    }

    /// Runs of a job, newest first
    pub fn runs(&self, job_id: JobId, limit: usize) -> Result<Vec<Run>, RuntimeError> {
        self.job(job_id)?;
        Ok(self.store.runs_for_job(job_id, limit))
    }

    pub fn run(&self, run_id: RunId) -> Result<Run, RuntimeError> {
        self.store.run(run_id).ok_or(RuntimeError::RunNotFound(run_id))
    }

    pub fn running_runs(&self) -> Vec<Run> {
        self.store.running_runs()
    }

    /// Events newest first, optionally for one job
    pub fn events(&self, job_id: Option<JobId>, limit: usize) -> Vec<Event> {
        self.store.events(job_id, limit)
    }

    // -- Configuration --

    /// Create a job, or replace the configuration of an existing one.
    ///
    /// New jobs get their workspace immediately. Editing a job recomputes
    /// its due time and records `next_due_recomputed`.
    pub fn upsert_job(
        &self,
        job_id: Option<JobId>,
        config: JobConfig,
        actor: Option<String>,
    ) -> Result<Job, RuntimeError> {
        validate_config(&config)?;
        let now = self.clock.now();

        let Some(job_id) = job_id else {
            let zone = self.zone;
            let job = self
                .store
                .create_job(&|id| zone.new_job(id, config.clone(), now))?;
            self.workspaces.ensure(job.id)?;
            tracing::info!(job_id = %job.id, name = %job.name, "job created");
            return Ok(job);
        };

        let mut job = self.job(job_id)?;
        self.zone.reconfigure(&mut job, config, now);
        self.store.save_job(&job)?;
        self.recomputed(&job, "job edited", actor)?;
        Ok(job)
    }

    /// Pause or resume the schedule of a job.
    pub fn set_paused(
        &self,
        job_id: JobId,
        paused: bool,
        actor: Option<String>,
    ) -> Result<Job, RuntimeError> {
        let reason = if paused { "job paused" } else { "job resumed" };
        self.update_flags(job_id, reason, actor, |job| job.paused = paused)
    }

    /// Activate or deactivate a job.
    pub fn set_active(
        &self,
        job_id: JobId,
        active: bool,
        actor: Option<String>,
    ) -> Result<Job, RuntimeError> {
        let reason = if active { "job activated" } else { "job deactivated" };
        self.update_flags(job_id, reason, actor, |job| job.active = active)
    }

    fn update_flags(
        &self,
        job_id: JobId,
        reason: &str,
        actor: Option<String>,
        apply: impl FnOnce(&mut Job),
    ) -> Result<Job, RuntimeError> {
        let now = self.clock.now();
        let mut job = self.job(job_id)?;
        apply(&mut job);
        job.updated_at = now;
        job.next_due = self.zone.first_due(&job, now);
        self.store.save_job(&job)?;
        self.recomputed(&job, reason, actor)?;
        Ok(job)
    }

    fn recomputed(
        &self,
        job: &Job,
        reason: &str,
        actor: Option<String>,
    ) -> Result<(), RuntimeError> {
        let message = match job.next_due {
            Some(due) => format!("{}, next due {}", reason, due.to_rfc3339()),
            None => format!("{}, not scheduled", reason),
        };
        self.events.record(
            NewEvent::new(EventKind::NextDueRecomputed, message)
                .job(job.id)
                .actor(actor)
                .metadata(json!({ "next_due": job.next_due })),
        )?;
        Ok(())
    }

    // -- Manual control --

    /// Start a run now, bypassing the schedule.
    pub fn run_now(
        &self,
        job_id: JobId,
        actor: Option<String>,
    ) -> Result<Dispatched, RuntimeError> {
        let job = self.job(job_id)?;
        if !job.allow_manual {
            return Err(RuntimeError::ManualNotAllowed(job_id));
        }

        let dispatched = match self
            .dispatcher
            .dispatch(&job, TriggerMode::Manual, actor.clone())?
        {
            DispatchOutcome::Started(dispatched) => dispatched,
            DispatchOutcome::Busy(run_id) => return Err(RuntimeError::JobBusy { job_id, run_id }),
            DispatchOutcome::Saturated => return Err(RuntimeError::Saturated),
        };

        let who = actor.as_deref().unwrap_or("operator");
        self.events.record(
            NewEvent::new(EventKind::ManualStart, format!("manual run started by {}", who))
                .job(job_id)
                .run(dispatched.run.id)
                .actor(actor),
        )?;
        Ok(dispatched)
    }

    /// Cancel a running run.
    ///
    /// The run's task is cancelled, so a run still provisioning never
    /// launches. The recorded process gets SIGTERM (and SIGKILL after a
    /// grace period) and the run is marked `failed` at once. A process that
    /// no longer exists is reported as already finished, not as an error.
    pub async fn stop_run(
        &self,
        run_id: RunId,
        actor: Option<String>,
    ) -> Result<StopReport, RuntimeError> {
        let run = self.run(run_id)?;
        if !run.is_running() {
            return Err(RuntimeError::RunNotRunning(run_id));
        }

        let cancelled = self.dispatcher.cancel(run_id);
        let note = match run.external_pid {
            Some(pid) => signal_stop(pid).await,
            None if cancelled => "run cancelled before its process was recorded".to_string(),
            None => "no process recorded, run marked as stopped".to_string(),
        };
        self.finish_stop(&run, note, actor)
    }

    /// Finalize a stopped run, unless it finished on its own meanwhile.
    fn finish_stop(
        &self,
        run: &Run,
        note: String,
        actor: Option<String>,
    ) -> Result<StopReport, RuntimeError> {
        let who = actor.as_deref().unwrap_or("operator");
        let mut log = self.dispatcher.executor().ledger().log(run.id);
        let stopped = log.finalize(RunOutcome::failed(None))?;
        if stopped {
            log.line(&format!("stop requested by {}: {}", who, note));
        }
        drop(log);

        let current = self.run(run.id)?;
        if !stopped {
            tracing::info!(
                run_id = %run.id,
                status = %current.status,
                "stop raced with completion"
            );
            return Ok(StopReport {
                note: format!("run already finished ({})", current.status),
                run: current,
            });
        }

        self.events.record(
            NewEvent::new(EventKind::ManualStop, note.clone())
                .job(run.job_id)
                .run(run.id)
                .actor(actor),
        )?;
        Ok(StopReport { run: current, note })
    }

    /// Cancel the running run of a job.
    pub async fn stop_job(
        &self,
        job_id: JobId,
        actor: Option<String>,
    ) -> Result<StopReport, RuntimeError> {
        self.job(job_id)?;
        let run = self
            .store
            .running_run(job_id)
            .ok_or(RuntimeError::NoRunningRun(job_id))?;
        self.stop_run(run.id, actor).await
    }

    // -- Resets --

    /// Empty a job's workspace, keeping the named top-level entries.
    pub fn reset_workspace(
        &self,
        job_id: JobId,
        keep: &[String],
        actor: Option<String>,
    ) -> Result<ResetReport, RuntimeError> {
        self.ensure_idle(job_id)?;
        let report = self.workspaces.reset(job_id, keep)?;
        self.workspaces.ensure(job_id)?;

        self.events.record(
            NewEvent::new(
                EventKind::WorkspaceReset,
                format!("workspace reset: {} removed, {} failed", report.removed, report.failed),
            )
            .job(job_id)
            .actor(actor)
            .metadata(json!({ "removed": report.removed, "failed": report.failed, "kept": keep })),
        )?;
        Ok(report)
    }

    /// Delete a job's isolated environment. Returns whether one existed.
    pub async fn reset_environment(
        &self,
        job_id: JobId,
        actor: Option<String>,
    ) -> Result<bool, RuntimeError> {
        self.ensure_idle(job_id)?;
        let existed = self.provisioner.reset(&self.workspaces.path_for(job_id)).await?;

        let message = if existed {
            "environment removed"
        } else {
            "no environment to remove"
        };
        self.events.record(
            NewEvent::new(EventKind::EnvironmentReset, message)
                .job(job_id)
                .actor(actor)
                .metadata(json!({ "existed": existed })),
        )?;
        Ok(existed)
    }

    fn ensure_idle(&self, job_id: JobId) -> Result<(), RuntimeError> {
        self.job(job_id)?;
        match self.store.running_run(job_id) {
            Some(run) => Err(RuntimeError::JobBusy {
                job_id,
                run_id: run.id,
            }),
            None => Ok(()),
        }
    }

    // -- Recovery --

    /// Fail runs left `running` by a previous process.
    ///
    /// Call once at startup, before the first tick. Their supervisors are
    /// gone, so each is finalized `failed` and a `run_anomaly` event is
    /// recorded. A recorded pid is only signalled while that process still
    /// runs inside the job's workspace; after a reboot the pid may name an
    /// unrelated process.
    pub async fn reconcile_orphaned_runs(&self) -> usize {
        let orphans = self.store.running_runs();

        for run in &orphans {
            let mut note = "daemon restarted while the run was in progress".to_string();
            if let Some(pid) = run.external_pid {
                if !signal::is_alive(pid).await {
                    note = format!("{}; process {} is gone", note, pid);
                } else if self.runs_in_workspace(pid, run.job_id) {
                    note = format!("{}; {}", note, signal_stop(pid).await);
                } else {
                    note = format!(
                        "{}; pid {} is not running in the job workspace, left alone",
                        note, pid
                    );
                }
            }
            tracing::warn!(job_id = %run.job_id, run_id = %run.id, "{}", note);

            let mut log = self.dispatcher.executor().ledger().log(run.id);
            log.line(&note);
            if let Err(e) = log.finalize(RunOutcome::failed(None)) {
                tracing::error!(run_id = %run.id, error = %e, "failed to finalize orphaned run");
            }
            drop(log);

            self.events.record_or_warn(
                NewEvent::new(EventKind::RunAnomaly, note)
                    .job(run.job_id)
                    .run(run.id),
            );
        }
        orphans.len()
    }

    fn runs_in_workspace(&self, pid: u32, job_id: JobId) -> bool {
        let workspace = self.workspaces.path_for(job_id);
        let workspace = std::fs::canonicalize(&workspace).unwrap_or(workspace);
        signal::process_cwd(pid).is_some_and(|cwd| cwd == workspace)
    }
}

/// SIGTERM `pid`, escalating to SIGKILL in the background.
async fn signal_stop(pid: u32) -> String {
    match signal::terminate(pid).await {
        Ok(Signalled::Delivered) => {
            tokio::spawn(async move {
                if signal::kill_after_grace(pid, KILL_GRACE).await {
                    tracing::warn!(pid, "process killed after grace period");
                }
            });
            format!("SIGTERM sent to pid {}", pid)
        }
        Ok(Signalled::NotFound) => format!("process {} already finished", pid),
        Err(e) => {
            tracing::warn!(pid, error = %e, "failed to signal process");
            format!("could not signal pid {}: {}", pid, e)
        }
    }
}

fn validate_config(config: &JobConfig) -> Result<(), RuntimeError> {
    if config.name.trim().is_empty() {
        return Err(RuntimeError::InvalidConfig("name must not be empty".to_string()));
    }
    if let Schedule::Interval { minutes: 0 } = config.schedule {
        return Err(ScheduleError::ZeroInterval.into());
    }
    if config.kind == JobKind::External {
        check_entrypoint(&config.entrypoint)
            .map_err(|e| RuntimeError::InvalidConfig(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
