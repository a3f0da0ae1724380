// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutation handlers for state-changing requests.

use std::time::Instant;

use orq_adapters::EnvProvisioner;
use orq_core::{Clock, Job, JobConfig, JobId};
use orq_daemon::protocol::{Response, RunSummary};
use orq_engine::{Runtime, RuntimeError, StopReport};

/// Turn a refused operation into an error response.
pub(super) fn rejected(e: RuntimeError) -> Response {
    tracing::warn!(error = %e, "request rejected");
    Response::Error {
        message: e.to_string(),
    }
}

pub(super) fn handle_status<P, C>(runtime: &Runtime<P, C>, start_time: Instant) -> Response
where
    P: EnvProvisioner,
    C: Clock,
{
    Response::Status {
        uptime_secs: start_time.elapsed().as_secs(),
        jobs: runtime.jobs().len(),
        runs_active: runtime.running_runs().len(),
        slots_free: runtime.available_slots(),
    }
}

pub(super) fn handle_job_upsert<P, C>(
    runtime: &Runtime<P, C>,
    job_id: Option<JobId>,
    config: JobConfig,
    actor: Option<String>,
) -> Response
where
    P: EnvProvisioner,
    C: Clock,
{
    handle_saved(runtime.upsert_job(job_id, config, actor))
}

pub(super) fn handle_saved(result: Result<Job, RuntimeError>) -> Response {
    match result {
        Ok(job) => Response::JobSaved { job: Box::new(job) },
        Err(e) => rejected(e),
    }
}

/// Start a manual run. The response does not wait for the run to finish.
pub(super) fn handle_job_run<P, C>(
    runtime: &Runtime<P, C>,
    job_id: JobId,
    actor: Option<String>,
) -> Response
where
    P: EnvProvisioner,
    C: Clock,
{
    match runtime.run_now(job_id, actor) {
        Ok(dispatched) => Response::RunStarted {
            run_id: dispatched.run.id,
            job_id,
        },
        Err(e) => rejected(e),
    }
}

pub(super) fn handle_stopped(result: Result<StopReport, RuntimeError>) -> Response {
    match result {
        Ok(report) => Response::RunStopped {
            run: RunSummary::from(&report.run),
            note: report.note,
        },
        Err(e) => rejected(e),
    }
}

#[cfg(test)]
#[path = "mutations_tests.rs"]
mod tests;
