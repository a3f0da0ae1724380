// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{clock, store};
use orq_core::{EventKind, JobId};

#[test]
fn record_stamps_and_persists() {
    let store = store();
    let clock = clock();
    let log = EventLog::new(Arc::clone(&store), clock.clone());

    let event = log
        .record(
            NewEvent::new(EventKind::ManualStart, "started by ops")
                .job(JobId::new(4))
                .actor(Some("ops".into())),
        )
        .unwrap();

    assert_eq!(event.at, clock.now());
    assert_eq!(store.events(Some(JobId::new(4)), 10), vec![event]);
}

#[test]
fn record_or_warn_records_events() {
    let store = store();
    let log = EventLog::new(Arc::clone(&store), clock());

    log.record_or_warn(NewEvent::new(EventKind::SchedulerError, "tick failed"));
    log.record_or_warn(NewEvent::new(EventKind::SchedulerError, "tick failed again"));

    let events = store.events(None, 10);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].message, "tick failed again");
}
