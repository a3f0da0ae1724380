// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule kinds and next-due evaluation.
//!
//! This is the only place that decides when a job is due next. Times of day
//! are interpreted in the timezone passed by the caller (the daemon uses
//! `chrono::Local`); the resulting instants are always UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fallback delay for a daily job without a configured time of day
pub const DAILY_FALLBACK_HOURS: i64 = 24;

/// Errors from parsing schedule parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid time of day '{0}' (expected HH:MM)")]
    InvalidTime(String),
    #[error("no valid times in '{0}' (expected HH:MM, HH:MM, ...)")]
    NoTimes(String),
    #[error("interval must be at least one minute")]
    ZeroInterval,
    #[error("invalid interval '{0}' (expected minutes)")]
    InvalidInterval(String),
    #[error("invalid timestamp '{0}' (expected RFC 3339)")]
    InvalidTimestamp(String),
    #[error("unknown schedule kind '{0}' (expected once, daily, multi-daily or interval)")]
    UnknownKind(String),
}

/// When a job should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// A single run at an absolute instant; consumed after dispatch
    Once { at: Option<DateTime<Utc>> },
    /// Every day at a time of day
    Daily { at: Option<NaiveTime> },
    /// Every day at each of several times of day
    MultiDaily { times: Vec<NaiveTime> },
    /// Fixed period measured from the last dispatch
    Interval { minutes: u32 },
}

impl Schedule {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Schedule::Once { .. } => "once",
            Schedule::Daily { .. } => "daily",
            Schedule::MultiDaily { .. } => "multi_daily",
            Schedule::Interval { .. } => "interval",
        }
    }

    /// Due time for a freshly configured (or re-enabled) job.
    ///
    /// Identical to [`Schedule::next_due_after`] except that a one-off job
    /// is due at its configured instant instead of being consumed.
    pub fn first_due<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Once { at } => *at,
            _ => self.next_due_after(now, tz),
        }
    }

    /// Due time following a dispatch (or a skip) that happened at `now`.
    pub fn next_due_after<Tz: TimeZone>(
        &self,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Once { .. } => None,
            Schedule::Interval { minutes } => {
                Some(now + Duration::minutes(i64::from((*minutes).max(1))))
            }
            Schedule::Daily { at: None } => Some(now + Duration::hours(DAILY_FALLBACK_HOURS)),
            Schedule::Daily { at: Some(time) } => {
                next_occurrence(std::slice::from_ref(time), now, tz)
            }
            Schedule::MultiDaily { times } => next_occurrence(times, now, tz),
        }
    }

    /// Human-readable parameters (`09:00`, `every 15m`, ...)
    pub fn describe(&self) -> String {
        match self {
            Schedule::Once { at: Some(at) } => format!("once at {}", at.to_rfc3339()),
            Schedule::Once { at: None } => "once (no time set)".to_string(),
            Schedule::Daily { at: Some(t) } => format!("daily at {}", t.format("%H:%M")),
            Schedule::Daily { at: None } => "daily (no time set)".to_string(),
            Schedule::MultiDaily { times } => {
                let list: Vec<String> = normalized(times)
                    .iter()
                    .map(|t| t.format("%H:%M").to_string())
                    .collect();
                format!("daily at {}", list.join(", "))
            }
            Schedule::Interval { minutes } => format!("every {}m", minutes),
        }
    }

    /// Build a schedule from a kind name and its textual parameter.
    ///
    /// `once` takes an RFC 3339 timestamp, `daily` a single `HH:MM`,
    /// `multi-daily` a comma separated list and `interval` minutes.
    pub fn parse(kind: &str, value: Option<&str>) -> Result<Self, ScheduleError> {
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        match kind.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "once" => {
                let at = value
                    .map(|v| {
                        DateTime::parse_from_rfc3339(v)
                            .map(|dt| dt.with_timezone(&Utc))
                            .map_err(|_| ScheduleError::InvalidTimestamp(v.to_string()))
                    })
                    .transpose()?;
                Ok(Schedule::Once { at })
            }
            "daily" => {
                let at = value.map(parse_time).transpose()?;
                Ok(Schedule::Daily { at })
            }
            "multi_daily" => {
                let raw = value.unwrap_or_default();
                let times = parse_times(raw);
                if times.is_empty() {
                    return Err(ScheduleError::NoTimes(raw.to_string()));
                }
                Ok(Schedule::MultiDaily { times })
            }
            "interval" => {
                let minutes = match value {
                    Some(v) => v
                        .trim_end_matches('m')
                        .parse::<u32>()
                        .map_err(|_| ScheduleError::InvalidInterval(v.to_string()))?,
                    None => 1,
                };
                if minutes == 0 {
                    return Err(ScheduleError::ZeroInterval);
                }
                Ok(Schedule::Interval { minutes })
            }
            other => Err(ScheduleError::UnknownKind(other.to_string())),
        }
    }
}

/// Parse `HH:MM` (or `HH:MM:SS`) into a time of day.
pub fn parse_time(s: &str) -> Result<NaiveTime, ScheduleError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidTime(s.to_string()))
}

/// Parse a comma separated list of times of day, ignoring invalid entries.
///
/// The result is sorted and deduplicated.
pub fn parse_times(s: &str) -> Vec<NaiveTime> {
    let parsed: Vec<NaiveTime> = s
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .filter_map(|part| parse_time(part).ok())
        .collect();
    normalized(&parsed)
}

fn normalized(times: &[NaiveTime]) -> Vec<NaiveTime> {
    let mut times = times.to_vec();
    times.sort();
    times.dedup();
    times
}

/// Earliest configured time strictly after `now` today, else the first one tomorrow.
fn next_occurrence<Tz: TimeZone>(
    times: &[NaiveTime],
    now: DateTime<Utc>,
    tz: &Tz,
) -> Option<DateTime<Utc>> {
    let times = normalized(times);
    let first = *times.first()?;
    let today = now.with_timezone(tz).date_naive();

    for time in &times {
        if let Some(candidate) = resolve_local(tz, today.and_time(*time)) {
            if candidate > now {
                return Some(candidate);
            }
        }
    }

    let tomorrow = today.succ_opt().unwrap_or(NaiveDate::MAX);
    resolve_local(tz, tomorrow.and_time(first))
}

/// Map a local wall-clock time to UTC.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// DST gap are pushed forward by an hour.
fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
