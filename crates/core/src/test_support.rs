// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::job::{Job, JobConfig, JobId};
use crate::schedule::{parse_time, Schedule};
use chrono::{DateTime, Utc};

/// Parse an RFC 3339 timestamp, panicking on bad input.
pub fn ts(s: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => unreachable!("bad test timestamp {s}: {e}"),
    }
}

/// Daily schedule at `HH:MM`
pub fn daily(time: &str) -> Schedule {
    Schedule::Daily {
        at: parse_time(time).ok(),
    }
}

pub fn interval(minutes: u32) -> Schedule {
    Schedule::Interval { minutes }
}

/// External job running `entrypoint` with the host interpreter
pub fn external_config(name: &str, entrypoint: &str, schedule: Schedule) -> JobConfig {
    JobConfig::builder(name, schedule)
        .entrypoint(entrypoint)
        .build()
}

/// Job materialized directly, bypassing the store
pub fn job(id: u64, config: JobConfig, now: DateTime<Utc>) -> Job {
    Job::new(JobId::new(id), config, now, &Utc)
}
