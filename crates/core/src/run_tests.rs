// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn open_run() -> Run {
    Run::open(
        RunId::new(1),
        JobId::new(1),
        TriggerMode::Scheduled,
        None,
        Utc::now(),
    )
}

#[test]
fn open_run_is_running_without_finish_time() {
    let run = open_run();
    assert!(run.is_running());
    assert!(run.finished_at.is_none());
    assert!(run.log.is_empty());
}

#[test]
fn finalize_sets_finish_time_once() {
    let mut run = open_run();
    let now = Utc::now();
    assert!(run.finalize(RunStatus::Failed, Some(3), now));
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.exit_code, Some(3));
    assert_eq!(run.finished_at, Some(now));

    // No transitions out of a terminal state
    assert!(!run.finalize(RunStatus::Success, Some(0), Utc::now()));
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.finished_at, Some(now));
}

#[test]
fn finalize_to_running_is_rejected() {
    let mut run = open_run();
    assert!(!run.finalize(RunStatus::Running, None, Utc::now()));
    assert!(run.finished_at.is_none());
}

#[yare::parameterized(
    under_cap     = { "abc", 5, "abc" },
    at_cap        = { "abcde", 5, "abcde" },
    over_cap      = { "abcdefg", 5, "cdefg" },
    disabled      = { "abcdefg", 0, "abcdefg" },
    multibyte     = { "ééééé", 3, "ééé" },
    mixed_width   = { "aé€b", 2, "€b" },
)]
fn cap_keeps_the_tail(input: &str, max: usize, expected: &str) {
    let mut log = input.to_string();
    cap_log(&mut log, max);
    assert_eq!(log, expected);
}

#[test]
fn append_log_applies_cap() {
    let mut run = open_run();
    run.append_log("0123456789", 8);
    run.append_log("ab", 8);
    assert_eq!(run.log, "456789ab");
}

#[test]
fn status_strings() {
    assert_eq!(RunStatus::Running.to_string(), "running");
    assert_eq!(RunStatus::Success.to_string(), "success");
    assert_eq!(RunStatus::Failed.to_string(), "failed");
    assert_eq!(TriggerMode::Manual.to_string(), "manual");
}
