// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run execution and asynchronous dispatch.
//!
//! [`Executor::execute`] takes one opened run from start to its terminal
//! state. [`Dispatcher::dispatch`] claims a slot in the bounded run pool,
//! opens the run atomically and hands it to a tokio task, so callers never
//! wait for a job to finish. Each dispatched run carries a cancellation
//! token until its task ends; [`Dispatcher::cancel`] fires it.

use crate::event_log::EventLog;
use crate::handlers::{HandlerContext, HandlerRegistry};
use crate::ledger::{LedgerConfig, LogSink, RunLedger, RunOutcome};
use crate::runner::{Launch, ProcessRunner, RunnerError};
use crate::workspace::{WorkspaceError, WorkspaceManager};
use orq_adapters::{EnvProvisioner, ProvisionError};
use orq_core::{Clock, EventKind, Job, JobKind, NewEvent, Run, RunId, TriggerMode};
use orq_storage::{JobStore, OpenRun, StoreError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Errors that fail a single execution
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("environment provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("unknown internal handler '{0}'")]
    UnknownHandler(String),
    #[error("handler failed: {0}")]
    Handler(String),
    #[error("run was stopped")]
    Stopped,
}

impl ExecuteError {
    /// The run was cancelled rather than failing on its own
    pub fn is_stop(&self) -> bool {
        matches!(self, ExecuteError::Stopped | ExecuteError::Runner(RunnerError::Stopped))
    }
}

/// Errors that prevent a dispatch from being attempted
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("dispatch requires a tokio runtime")]
    NoRuntime,
}

/// A run that was opened and handed to a task
#[derive(Debug)]
pub struct Dispatched {
    pub run: Run,
    /// Completes once the run reached a terminal state
    pub task: JoinHandle<()>,
}

/// Result of a dispatch attempt
#[derive(Debug)]
pub enum DispatchOutcome {
    Started(Dispatched),
    /// The job already has this run in progress
    Busy(RunId),
    /// Every run slot is taken
    Saturated,
}

/// Drives one run through workspace, environment and process.
pub struct Executor<P, C: Clock> {
    workspaces: WorkspaceManager,
    provisioner: P,
    runner: ProcessRunner,
    handlers: HandlerRegistry,
    ledger: RunLedger<C>,
    events: EventLog<C>,
}

impl<P, C> Executor<P, C>
where
    P: EnvProvisioner,
    C: Clock,
{
    pub fn new(
        store: Arc<dyn JobStore>,
        workspaces: WorkspaceManager,
        provisioner: P,
        handlers: HandlerRegistry,
        ledger: LedgerConfig,
        clock: C,
    ) -> Self {
        Self {
            workspaces,
            provisioner,
            runner: ProcessRunner::default(),
            handlers,
            ledger: RunLedger::new(Arc::clone(&store), clock.clone(), ledger),
            events: EventLog::new(store, clock),
        }
    }

    pub fn ledger(&self) -> &RunLedger<C> {
        &self.ledger
    }

    /// Execute an opened run and finalize it.
    ///
    /// Every failure ends up in the run log and a `failed` run. If the run
    /// cannot be finalized a `run_anomaly` event is recorded instead.
    /// Cancelling `cancel` stops the run at the next step boundary.
    pub async fn execute(
        &self,
        job: &Job,
        run_id: RunId,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let mut log = self.ledger.log(run_id);
        log.line(&format!(
            "starting '{}' (job {}, run {})",
            job.name, job.id, run_id
        ));

        let outcome = match self.execute_inner(job, run_id, &mut log, cancel).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_stop() => {
                tracing::info!(job_id = %job.id, run_id = %run_id, "run stopped before launch");
                log.line(&e.to_string());
                RunOutcome::failed(None)
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, run_id = %run_id, error = %e, "execution failed");
                log.line(&format!("execution failed: {}", e));
                RunOutcome::failed(None)
            }
        };
        if outcome.is_success() {
            log.line("finished successfully");
        }

        match log.finalize(outcome) {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(job_id = %job.id, run_id = %run_id, "run was already finalized");
            }
            Err(e) => self.events.record_or_warn(
                NewEvent::new(EventKind::RunAnomaly, format!("failed to finalize run: {}", e))
                    .job(job.id)
                    .run(run_id),
            ),
        }
        outcome
    }

    async fn execute_inner(
        &self,
        job: &Job,
        run_id: RunId,
        log: &mut dyn LogSink,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, ExecuteError> {
        let workspace = self.workspaces.ensure(job.id)?;
        if cancel.is_cancelled() {
            return Err(ExecuteError::Stopped);
        }

        match &job.kind {
            JobKind::External => {
                let resolution = tokio::select! {
                    resolved = self.provisioner.resolve(&workspace, job.isolated) => resolved?,
                    _ = cancel.cancelled() => return Err(ExecuteError::Stopped),
                };
                for line in &resolution.transcript {
                    log.line(line);
                }
                let launch = Launch {
                    job,
                    run_id,
                    workspace: &workspace,
                    interpreter: &resolution.interpreter,
                };
                Ok(self.runner.run(launch, log, cancel).await?)
            }
            JobKind::Internal { handler } => {
                let Some(handler_impl) = self.handlers.get(handler) else {
                    return Err(ExecuteError::UnknownHandler(handler.clone()));
                };
                log.line(&format!("running internal handler '{}'", handler));
                let mut ctx = HandlerContext::new(job, run_id, &workspace, log);
                tokio::select! {
                    result = handler_impl.run(&mut ctx) => result.map_err(ExecuteError::Handler)?,
                    _ = cancel.cancelled() => return Err(ExecuteError::Stopped),
                }
                Ok(RunOutcome::success())
            }
        }
    }

    /// Finalize a run whose execution task died without finishing it.
    fn recover(&self, job: &Job, run_id: RunId, err: JoinError) {
        let reason = if err.is_panic() {
            "execution task panicked"
        } else {
            "execution task was cancelled"
        };
        tracing::error!(job_id = %job.id, run_id = %run_id, "{}", reason);

        let mut log = self.ledger.log(run_id);
        log.line(reason);
        if let Err(e) = log.finalize(RunOutcome::failed(None)) {
            self.events.record_or_warn(
                NewEvent::new(EventKind::RunAnomaly, format!("{}; finalize failed: {}", reason, e))
                    .job(job.id)
                    .run(run_id),
            );
        }
    }
}

/// Hands runs to tokio tasks under a bounded pool.
pub struct Dispatcher<P, C: Clock> {
    executor: Arc<Executor<P, C>>,
    permits: Arc<Semaphore>,
    cancels: Arc<Mutex<HashMap<RunId, CancellationToken>>>,
}

impl<P, C: Clock> Clone for Dispatcher<P, C> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            permits: Arc::clone(&self.permits),
            cancels: Arc::clone(&self.cancels),
        }
    }
}

impl<P, C> Dispatcher<P, C>
where
    P: EnvProvisioner,
    C: Clock,
{
    pub fn new(executor: Executor<P, C>, max_concurrent_runs: usize) -> Self {
        Self {
            executor: Arc::new(executor),
            permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn executor(&self) -> &Executor<P, C> {
        &self.executor
    }

    /// Free run slots
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Cancel a run executing in this process.
    ///
    /// Returns false if no task of this dispatcher owns the run.
    pub fn cancel(&self, run_id: RunId) -> bool {
        match self.cancels.lock().get(&run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Open a run for `job` and start executing it in the background.
    ///
    /// Never waits for the job. The slot is claimed before the run is
    /// opened so a saturated pool leaves no orphaned `running` record.
    pub fn dispatch(
        &self,
        job: &Job,
        trigger: TriggerMode,
        actor: Option<String>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            return Ok(DispatchOutcome::Saturated);
        };

        let run = match self.executor.ledger.open(job.id, trigger, actor)? {
            OpenRun::Opened(run) => run,
            OpenRun::Busy(run_id) => return Ok(DispatchOutcome::Busy(run_id)),
        };

        let span = tracing::info_span!("run", job_id = %job.id, run_id = %run.id, %trigger);
        let run_id = run.id;
        let cancel = CancellationToken::new();
        self.cancels.lock().insert(run_id, cancel.clone());

        let executor = Arc::clone(&self.executor);
        let task_job = job.clone();
        let inner = handle.spawn(
            async move {
                executor.execute(&task_job, run_id, &cancel).await;
            }
            .instrument(span),
        );

        let executor = Arc::clone(&self.executor);
        let cancels = Arc::clone(&self.cancels);
        let job = job.clone();
        let task = handle.spawn(async move {
            let _permit = permit;
            if let Err(e) = inner.await {
                executor.recover(&job, run_id, e);
            }
            cancels.lock().remove(&run_id);
        });

        Ok(DispatchOutcome::Started(Dispatched { run, task }))
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
