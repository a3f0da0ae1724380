// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time zone in which times of day are interpreted

use crate::job::{Job, JobConfig, JobId};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Zone for daily and multi-daily schedules.
///
/// Instants are always stored in UTC; only `HH:MM` times of day are
/// resolved in this zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleZone {
    /// The host's local zone
    #[default]
    Local,
    Utc,
}

impl ScheduleZone {
    /// See [`Job::new`]
    pub fn new_job(self, id: JobId, config: JobConfig, now: DateTime<Utc>) -> Job {
        match self {
            ScheduleZone::Local => Job::new(id, config, now, &Local),
            ScheduleZone::Utc => Job::new(id, config, now, &Utc),
        }
    }

    /// See [`Job::reconfigure`]
    pub fn reconfigure(self, job: &mut Job, config: JobConfig, now: DateTime<Utc>) {
        match self {
            ScheduleZone::Local => job.reconfigure(config, now, &Local),
            ScheduleZone::Utc => job.reconfigure(config, now, &Utc),
        }
    }

    /// See [`Job::compute_next_due`]
    pub fn next_due(self, job: &Job, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleZone::Local => job.compute_next_due(now, &Local),
            ScheduleZone::Utc => job.compute_next_due(now, &Utc),
        }
    }

    /// See [`Job::first_due`]
    pub fn first_due(self, job: &Job, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleZone::Local => job.first_due(now, &Local),
            ScheduleZone::Utc => job.first_due(now, &Utc),
        }
    }

    /// See [`Job::next_slot_after`]
    pub fn next_slot_after(self, job: &Job, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleZone::Local => job.next_slot_after(now, &Local),
            ScheduleZone::Utc => job.next_slot_after(now, &Utc),
        }
    }
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod tests;
