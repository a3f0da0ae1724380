// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for operator operations

use crate::dispatch::DispatchError;
use crate::workspace::WorkspaceError;
use orq_adapters::ProvisionError;
use orq_core::{JobId, RunId, ScheduleError};
use orq_storage::StoreError;
use thiserror::Error;

/// Errors returned by [`crate::Runtime`] operations
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("run not found: {0}")]
    RunNotFound(RunId),
    #[error("run {0} is not running")]
    RunNotRunning(RunId),
    #[error("job {0} has no running run")]
    NoRunningRun(JobId),
    #[error("job {0} does not allow manual runs")]
    ManualNotAllowed(JobId),
    #[error("job {job_id} is busy with run {run_id}")]
    JobBusy { job_id: JobId, run_id: RunId },
    #[error("all run slots are in use, try again later")]
    Saturated,
    #[error("invalid job configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
