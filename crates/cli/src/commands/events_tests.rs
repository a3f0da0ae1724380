// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orq_core::test_support::ts;
use orq_core::{EventId, EventKind, NewEvent, RunId};

#[test]
fn row_of_manual_start() {
    let event = NewEvent::new(EventKind::ManualStart, "run 4 started")
        .job(JobId::new(2))
        .run(RunId::new(4))
        .actor(Some("alice".to_string()))
        .into_event(EventId::new(11), ts("2026-03-10T08:00:00Z"));

    assert_eq!(
        event_row(&event, ts("2026-03-10T08:02:00Z")),
        vec!["11", "2m ago", "manual_start", "2", "4", "alice", "run 4 started"]
    );
}

#[test]
fn missing_references_show_dashes() {
    let event = NewEvent::new(EventKind::SchedulerError, "store unavailable")
        .into_event(EventId::new(1), ts("2026-03-10T08:00:00Z"));

    let row = event_row(&event, ts("2026-03-10T08:00:00Z"));

    assert_eq!(&row[2..6], &["scheduler_error", "-", "-", "-"]);
}

#[test]
fn empty_event_list_renders_empty_table() {
    assert!(events_table(&[], ts("2026-03-10T08:00:00Z")).is_empty());
}
