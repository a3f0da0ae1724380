//! Daemon lifecycle specs
//!
//! Verify daemon start/stop/status and startup failures.

use crate::prelude::*;

#[test]
fn start_status_stop() {
    let state = State::empty();

    state
        .orq()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("Daemon started");
    state
        .orq()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Status: running")
        .stdout_has("Jobs: 0");
    state
        .orq()
        .args(&["daemon", "stop"])
        .passes()
        .stdout_has("Daemon stopped");
    state
        .orq()
        .args(&["daemon", "status"])
        .passes()
        .stdout_eq("Daemon not running\n");
}

#[test]
fn second_start_reports_running_daemon() {
    let state = State::empty();
    state.orq().args(&["daemon", "start"]).passes();

    state
        .orq()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("Daemon already running");
}

#[test]
fn stop_without_daemon() {
    let state = State::empty();
    state
        .orq()
        .args(&["daemon", "stop"])
        .passes()
        .stdout_eq("Daemon not running\n");
}

#[test]
fn invalid_settings_fail_startup() {
    let state = State::empty();
    state.file("orq.toml", "max_concurrent_runs = 0\n");

    state
        .orq()
        .args(&["daemon", "start"])
        .fails()
        .stderr_has("max_concurrent_runs must be at least 1");
}

#[test]
fn jobs_survive_restart() {
    let state = State::empty();
    let id = state.add_job(&["nightly", "-s", "daily", "--at", "03:00"]);

    state.orq().args(&["daemon", "restart"]).passes();

    state
        .orq()
        .args(&["job", "show", &id.to_string()])
        .passes()
        .stdout_has("nightly")
        .stdout_has("daily at 03:00");
}
