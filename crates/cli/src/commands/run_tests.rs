// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orq_core::test_support::ts;
use orq_core::{RunStatus, TriggerMode};

fn finished_run() -> Run {
    let mut run = Run::open(
        RunId::new(9),
        JobId::new(2),
        TriggerMode::Manual,
        Some("alice".to_string()),
        ts("2026-03-10T08:00:00Z"),
    );
    run.external_pid = Some(4242);
    run.finalize(RunStatus::Success, Some(0), ts("2026-03-10T08:01:30Z"));
    run
}

#[test]
fn row_of_finished_manual_run() {
    let run = finished_run();
    let now = ts("2026-03-10T08:10:00Z");

    assert_eq!(
        run_row(&RunSummary::from(&run), now),
        vec!["9", "2", "success", "manual", "alice", "10m ago", "1m30s", "0"]
    );
}

#[test]
fn row_of_running_scheduled_run() {
    let run = Run::open(
        RunId::new(3),
        JobId::new(1),
        TriggerMode::Scheduled,
        None,
        ts("2026-03-10T08:00:00Z"),
    );
    let now = ts("2026-03-10T08:00:45Z");

    assert_eq!(
        run_row(&RunSummary::from(&run), now),
        vec!["3", "1", "running", "scheduled", "-", "45s ago", "45s", "-"]
    );
}

#[test]
fn table_has_one_row_per_run() {
    let run = finished_run();
    let summaries = vec![RunSummary::from(&run), RunSummary::from(&run)];

    let table = runs_table(&summaries, ts("2026-03-10T08:10:00Z"));

    assert!(!table.is_empty());
    let mut buf = Vec::new();
    table.render(&mut buf);
    let text = String::from_utf8(buf).unwrap();
    assert_eq!(text.lines().count(), 3, "{text}");
}

#[test]
fn tail_limits_log_lines() {
    let log = "one\ntwo\nthree\n";

    assert_eq!(tail_of(log, Some(2)), "two\nthree");
    assert_eq!(tail_of(log, None), log);
}

#[test]
fn detail_shows_pid_and_exit_code() {
    let run = finished_run();

    let mut buf = Vec::new();
    write_run_detail(&mut buf, &run, ts("2026-03-10T08:10:00Z")).unwrap();
    let text = String::from_utf8(buf).unwrap();

    assert!(text.starts_with("Run 9 of job 2\n"), "{text}");
    assert!(text.contains("  Trigger:   manual by alice\n"), "{text}");
    assert!(text.contains("  Duration:  1m30s\n"), "{text}");
    assert!(text.contains("  PID:       4242\n"), "{text}");
    assert!(text.contains("  Exit code: 0\n"), "{text}");
}

#[test]
fn detail_of_running_run_has_no_finish() {
    let run = Run::open(
        RunId::new(3),
        JobId::new(1),
        TriggerMode::Scheduled,
        None,
        ts("2026-03-10T08:00:00Z"),
    );

    let mut buf = Vec::new();
    write_run_detail(&mut buf, &run, ts("2026-03-10T08:00:05Z")).unwrap();
    let text = String::from_utf8(buf).unwrap();

    assert!(text.contains("  Trigger:   scheduled\n"), "{text}");
    assert!(text.contains("  Finished:  -\n"), "{text}");
    assert!(!text.contains("Exit code"), "{text}");
}

#[test]
fn only_stop_is_an_action() {
    assert!(RunCommand::Stop { id: RunId::new(1) }.is_action());
    assert!(!RunCommand::Logs {
        id: RunId::new(1),
        tail: None
    }
    .is_action());
    assert!(!RunCommand::List {
        job: None,
        limit: 20
    }
    .is_action());
}
