// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! orq execution engine: workspaces, run ledger, process runner,
//! dispatch and scheduling

mod dispatch;
mod error;
mod event_log;
pub mod handlers;
mod ledger;
mod runner;
mod runtime;
mod scheduler;
mod workspace;

#[cfg(test)]
mod test_helpers;

pub use dispatch::{DispatchError, DispatchOutcome, Dispatched, Dispatcher, ExecuteError, Executor};
pub use error::RuntimeError;
pub use event_log::EventLog;
pub use handlers::{HandlerContext, HandlerRegistry, InternalHandler};
pub use ledger::{LedgerConfig, LogSink, RunLedger, RunLog, RunOutcome};
pub use runner::{check_entrypoint, resolve_entrypoint, Launch, ProcessRunner, RunnerError};
pub use runtime::{Runtime, RuntimeConfig, RuntimeDeps, StopReport};
pub use scheduler::{Scheduler, TickReport};
pub use workspace::{ResetReport, WorkspaceError, WorkspaceManager, README_FILE};
