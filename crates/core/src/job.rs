// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definitions and their schedule state

use crate::schedule::Schedule;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier of a configured job, allocated by the store.
    pub struct JobId;
}

/// Default script executed inside the job workspace
pub const DEFAULT_ENTRYPOINT: &str = "main.py";

/// What a run of the job executes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// Launch the entrypoint script in the job workspace
    #[default]
    External,
    /// Call an in-process handler registered under this name
    Internal { handler: String },
}

/// A configured, potentially recurring unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    /// Run inside a dedicated environment instead of the host interpreter
    pub isolated: bool,
    pub entrypoint: String,
    #[serde(default)]
    pub kind: JobKind,
    pub schedule: Schedule,
    pub active: bool,
    /// Schedule suspended without deactivating the job
    pub paused: bool,
    pub allow_manual: bool,
    pub next_due: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Materialize a job from its configuration.
    ///
    /// `next_due` is derived from the schedule as of `now`.
    pub fn new<Tz: TimeZone>(id: JobId, config: JobConfig, now: DateTime<Utc>, tz: &Tz) -> Self {
        let mut job = Self {
            id,
            name: config.name,
            isolated: config.isolated,
            entrypoint: config.entrypoint,
            kind: config.kind,
            schedule: config.schedule,
            active: config.active,
            paused: config.paused,
            allow_manual: config.allow_manual,
            next_due: None,
            created_at: now,
            updated_at: now,
        };
        job.next_due = job.first_due(now, tz);
        job
    }

    /// Whether the scheduler may fire this job at all
    pub fn is_schedulable(&self) -> bool {
        self.active && !self.paused
    }

    /// Whether the job is waiting to run at or before `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_schedulable() && self.next_due.is_some_and(|due| due <= now)
    }

    /// Due time after a dispatch or skip at `now`; `None` while inactive or paused.
    pub fn compute_next_due<Tz: TimeZone>(
        &self,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Option<DateTime<Utc>> {
        if !self.is_schedulable() {
            return None;
        }
        self.schedule.next_due_after(now, tz)
    }

    /// Next schedule slot after `now` for a job whose due time passed while
    /// paused. The pause flag is ignored so the missed slot is consumed
    /// instead of piling up until resume.
    pub fn next_slot_after<Tz: TimeZone>(
        &self,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Option<DateTime<Utc>> {
        if !self.active {
            return None;
        }
        self.schedule.next_due_after(now, tz)
    }

    /// Due time after the schedule was (re)configured or the job resumed.
    pub fn first_due<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> Option<DateTime<Utc>> {
        if !self.is_schedulable() {
            return None;
        }
        self.schedule.first_due(now, tz)
    }

    /// Apply a new configuration, keeping identity and creation time.
    pub fn reconfigure<Tz: TimeZone>(&mut self, config: JobConfig, now: DateTime<Utc>, tz: &Tz) {
        self.name = config.name;
        self.isolated = config.isolated;
        self.entrypoint = config.entrypoint;
        self.kind = config.kind;
        self.schedule = config.schedule;
        self.active = config.active;
        self.paused = config.paused;
        self.allow_manual = config.allow_manual;
        self.updated_at = now;
        self.next_due = self.first_due(now, tz);
    }

    /// Configuration view of this job, e.g. for editing a single field.
    pub fn config(&self) -> JobConfig {
        JobConfig {
            name: self.name.clone(),
            isolated: self.isolated,
            entrypoint: self.entrypoint.clone(),
            kind: self.kind.clone(),
            schedule: self.schedule.clone(),
            active: self.active,
            paused: self.paused,
            allow_manual: self.allow_manual,
        }
    }
}

/// Operator-supplied job configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub isolated: bool,
    pub entrypoint: String,
    #[serde(default)]
    pub kind: JobKind,
    pub schedule: Schedule,
    pub active: bool,
    pub paused: bool,
    pub allow_manual: bool,
}

impl JobConfig {
    pub fn builder(name: impl Into<String>, schedule: Schedule) -> JobConfigBuilder {
        JobConfigBuilder {
            config: JobConfig {
                name: name.into(),
                isolated: false,
                entrypoint: DEFAULT_ENTRYPOINT.to_string(),
                kind: JobKind::External,
                schedule,
                active: true,
                paused: false,
                allow_manual: true,
            },
        }
    }
}

/// Builder for [`JobConfig`]
#[derive(Debug, Clone)]
pub struct JobConfigBuilder {
    config: JobConfig,
}

impl JobConfigBuilder {
    pub fn isolated(mut self, isolated: bool) -> Self {
        self.config.isolated = isolated;
        self
    }

    pub fn entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.config.entrypoint = entrypoint.into();
        self
    }

    pub fn internal(mut self, handler: impl Into<String>) -> Self {
        self.config.kind = JobKind::Internal {
            handler: handler.into(),
        };
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.config.active = active;
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.config.paused = paused;
        self
    }

    pub fn allow_manual(mut self, allow: bool) -> Self {
        self.config.allow_manual = allow;
        self
    }

    pub fn build(self) -> JobConfig {
        self.config
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
