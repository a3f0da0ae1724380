// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! orq-core: data model for the orq job orchestrator

pub mod clock;
pub mod event;
pub mod id;
pub mod job;
pub mod run;
pub mod schedule;
pub mod time_fmt;
pub mod zone;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{Event, EventId, EventKind, NewEvent};
pub use job::{Job, JobConfig, JobConfigBuilder, JobId, JobKind};
pub use run::{cap_log, Run, RunId, RunStatus, TriggerMode};
pub use schedule::{parse_time, parse_times, Schedule, ScheduleError};
pub use time_fmt::{format_duration, format_elapsed};
pub use zone::ScheduleZone;
