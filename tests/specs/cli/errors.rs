//! CLI error handling specs
//!
//! Verify error messages and exit codes for bad input.

use crate::prelude::*;

#[test]
fn unknown_command_is_a_usage_error() {
    cli()
        .args(&["frobnicate", "list"])
        .fails()
        .exits_with(2)
        .stderr_has("unrecognized subcommand");
}

#[test]
fn queries_do_not_start_the_daemon() {
    let state = State::empty();
    state
        .orq()
        .args(&["job", "list"])
        .fails()
        .exits_with(1)
        .stderr_has("Daemon not running");
}

#[test]
fn add_requires_schedule() {
    let state = State::empty();
    state
        .orq()
        .args(&["job", "add", "report"])
        .fails()
        .stderr_has("a schedule is required");
}

#[test]
fn add_rejects_bad_time() {
    let state = State::empty();
    state
        .orq()
        .args(&["job", "add", "report", "-s", "daily", "--at", "25:00"])
        .fails()
        .stderr_has("invalid time of day '25:00'");
}

#[test]
fn unknown_job_is_reported() {
    let state = State::empty();
    state.orq().args(&["daemon", "start"]).passes();

    state
        .orq()
        .args(&["job", "run", "99"])
        .fails()
        .stderr_has("job not found: 99");
}

#[test]
fn manual_runs_can_be_refused() {
    let state = State::empty();
    let id = state.add_job(&["locked", "-s", "interval", "--every", "60", "--no-manual"]);

    state
        .orq()
        .args(&["job", "run", &id.to_string()])
        .fails()
        .stderr_has("does not allow manual runs");
}
