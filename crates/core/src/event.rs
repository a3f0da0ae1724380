// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit events for scheduling and operator actions.
//!
//! Events are immutable once recorded; the store assigns the id and timestamp.

use crate::job::JobId;
use crate::run::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Identifier of an audit event, allocated by the store.
    pub struct EventId;
}

/// Kind of audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ScheduleFired,
    ScheduleSkippedPaused,
    ScheduleSkippedInactive,
    ManualStart,
    ManualStop,
    NextDueRecomputed,
    SchedulerError,
    EnvironmentReset,
    WorkspaceReset,
    /// A run could not be finalized normally
    RunAnomaly,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ScheduleFired => "schedule_fired",
            EventKind::ScheduleSkippedPaused => "schedule_skipped_paused",
            EventKind::ScheduleSkippedInactive => "schedule_skipped_inactive",
            EventKind::ManualStart => "manual_start",
            EventKind::ManualStop => "manual_stop",
            EventKind::NextDueRecomputed => "next_due_recomputed",
            EventKind::SchedulerError => "scheduler_error",
            EventKind::EnvironmentReset => "environment_reset",
            EventKind::WorkspaceReset => "workspace_reset",
            EventKind::RunAnomaly => "run_anomaly",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub job_id: Option<JobId>,
    pub run_id: Option<RunId>,
    pub kind: EventKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub actor: Option<String>,
    pub at: DateTime<Utc>,
}

/// An event waiting to be recorded
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub job_id: Option<JobId>,
    pub run_id: Option<RunId>,
    pub kind: EventKind,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
    pub actor: Option<String>,
}

impl NewEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            job_id: None,
            run_id: None,
            kind,
            message: message.into(),
            metadata: None,
            actor: None,
        }
    }

    pub fn job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn run(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }

    /// Stamp the event with its id and time.
    pub fn into_event(self, id: EventId, at: DateTime<Utc>) -> Event {
        Event {
            id,
            job_id: self.job_id,
            run_id: self.run_id,
            kind: self.kind,
            message: self.message,
            metadata: self.metadata,
            actor: self.actor,
            at,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
