// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orq_core::test_support::{external_config, interval, job, ts};
use orq_core::{EventKind, NewEvent, TriggerMode};

fn state_with_job() -> MaterializedState {
    let mut state = MaterializedState::default();
    let job = job(1, external_config("tick", "main.sh", interval(5)), ts("2026-03-10T08:00:00Z"));
    state.apply_op(&StoreOp::JobSaved { job });
    state
}

fn open(state: &mut MaterializedState, job_id: u64) -> RunId {
    let run = Run::open(
        state.next_run_id(),
        JobId::new(job_id),
        TriggerMode::Scheduled,
        None,
        ts("2026-03-10T08:05:00Z"),
    );
    let id = run.id;
    state.apply_op(&StoreOp::RunOpened { run });
    id
}

#[test]
fn job_saved_advances_id_counter() {
    let state = state_with_job();
    assert_eq!(state.next_job_id(), JobId::new(2));
    assert!(state.jobs.contains_key(&JobId::new(1)));
}

#[test]
fn next_due_set_updates_job() {
    let mut state = state_with_job();
    let at = ts("2026-03-10T09:00:00Z");
    state.apply_op(&StoreOp::NextDueSet {
        job_id: JobId::new(1),
        next_due: None,
        at,
    });
    let job = &state.jobs[&JobId::new(1)];
    assert_eq!(job.next_due, None);
    assert_eq!(job.updated_at, at);
}

#[test]
fn ops_for_unknown_records_are_ignored() {
    let mut state = MaterializedState::default();
    state.apply_op(&StoreOp::NextDueSet {
        job_id: JobId::new(42),
        next_due: None,
        at: ts("2026-03-10T09:00:00Z"),
    });
    state.apply_op(&StoreOp::RunPidSet {
        run_id: RunId::new(7),
        pid: 1,
    });
    assert!(state.jobs.is_empty());
    assert!(state.runs.is_empty());
}

#[test]
fn running_run_tracks_lifecycle() {
    let mut state = state_with_job();
    let run_id = open(&mut state, 1);
    assert_eq!(state.running_run(JobId::new(1)).map(|r| r.id), Some(run_id));

    state.apply_op(&StoreOp::RunFinalized {
        run_id,
        status: RunStatus::Success,
        exit_code: Some(0),
        at: ts("2026-03-10T08:06:00Z"),
    });
    assert!(state.running_run(JobId::new(1)).is_none());
}

#[test]
fn finalize_replay_does_not_leave_terminal_state() {
    let mut state = state_with_job();
    let run_id = open(&mut state, 1);
    let first = ts("2026-03-10T08:06:00Z");
    state.apply_op(&StoreOp::RunFinalized {
        run_id,
        status: RunStatus::Failed,
        exit_code: None,
        at: first,
    });
    state.apply_op(&StoreOp::RunFinalized {
        run_id,
        status: RunStatus::Success,
        exit_code: Some(0),
        at: ts("2026-03-10T08:07:00Z"),
    });
    let run = &state.runs[&run_id];
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.finished_at, Some(first));
}

#[test]
fn log_appends_respect_cap() {
    let mut state = state_with_job();
    let run_id = open(&mut state, 1);
    for chunk in ["aaaa", "bbbb", "cccc"] {
        state.apply_op(&StoreOp::RunLogAppended {
            run_id,
            text: chunk.to_string(),
            max_chars: 6,
        });
    }
    assert_eq!(state.runs[&run_id].log, "bbcccc");
}

#[test]
fn runs_for_job_are_newest_first() {
    let mut state = state_with_job();
    let first = open(&mut state, 1);
    let second = open(&mut state, 1);
    let ids: Vec<RunId> = state.runs_for_job(JobId::new(1)).map(|r| r.id).collect();
    assert_eq!(ids, vec![second, first]);
}

#[test]
fn event_recorded_advances_counter() {
    let mut state = MaterializedState::default();
    let event = NewEvent::new(EventKind::ScheduleFired, "fired")
        .into_event(state.next_event_id(), ts("2026-03-10T08:00:00Z"));
    state.apply_op(&StoreOp::EventRecorded { event });
    assert_eq!(state.next_event_id(), EventId::new(2));
    assert_eq!(state.events.len(), 1);
}

#[test]
fn state_round_trips_through_json() {
    let mut state = state_with_job();
    open(&mut state, 1);
    let json = serde_json::to_string(&state).unwrap();
    let back: MaterializedState = serde_json::from_str(&json).unwrap();
    assert_eq!(back.jobs, state.jobs);
    assert_eq!(back.runs, state.runs);
    assert_eq!(back.next_run_id(), state.next_run_id());
}
