//! Job run specs
//!
//! Manual runs of internal handlers and external entrypoints.

use crate::prelude::*;

/// Wait until the job's latest run has a recorded process id.
fn wait_for_pid(state: &State, job_id: &str) -> bool {
    wait_for(SPEC_WAIT_MAX_MS, || {
        let runs = state
            .orq()
            .args(&["-o", "json", "run", "list", job_id])
            .passes()
            .json();
        runs[0]["external_pid"].is_u64()
    })
}

#[test]
fn internal_handler_run_waits_for_log() {
    let state = State::empty();
    let id = state.add_job(&[
        "inventory",
        "-s",
        "interval",
        "--every",
        "60",
        "--handler",
        "workspace-inventory",
    ]);

    state
        .orq()
        .args(&["job", "run", &id.to_string(), "--wait", "--timeout", "10"])
        .passes()
        .stdout_has("entries in")
        .stdout_has("inputs/");
}

#[test]
fn external_entrypoint_output_is_captured() {
    let state = State::with_shell_interpreter();
    let id = state.add_job(&["hello", "-s", "daily", "--at", "09:00", "--entrypoint", "main.sh"]);
    state.file(state.workspace(id).join("main.sh"), "echo hello from $ORQ_JOB_ID\n");

    state
        .orq()
        .args(&["job", "run", &id.to_string(), "--wait", "--timeout", "10"])
        .passes()
        .stdout_has(&format!("hello from {}", id));

    state
        .orq()
        .args(&["run", "list", &id.to_string()])
        .passes()
        .stdout_has("success")
        .stdout_has("manual");
}

#[test]
fn failing_entrypoint_exits_with_one() {
    let state = State::with_shell_interpreter();
    let id = state.add_job(&["broken", "-s", "daily", "--at", "09:00", "--entrypoint", "main.sh"]);
    state.file(state.workspace(id).join("main.sh"), "echo boom >&2\nexit 3\n");

    state
        .orq()
        .args(&["job", "run", &id.to_string(), "--wait", "--timeout", "10"])
        .fails()
        .exits_with(1)
        .stdout_has("boom")
        .stderr_has("failed (exit code 3)");
}

#[test]
fn missing_entrypoint_fails_the_run() {
    let state = State::with_shell_interpreter();
    let id = state.add_job(&["empty", "-s", "daily", "--at", "09:00", "--entrypoint", "main.sh"]);

    state
        .orq()
        .args(&["job", "run", &id.to_string(), "--wait", "--timeout", "10"])
        .fails()
        .exits_with(1);
}

#[test]
fn stopping_a_long_run() {
    let state = State::with_shell_interpreter();
    let id = state.add_job(&["slow", "-s", "daily", "--at", "09:00", "--entrypoint", "main.sh"]);
    state.file(state.workspace(id).join("main.sh"), "sleep 30\n");
    let id = id.to_string();

    state.orq().args(&["job", "run", &id]).passes().stdout_has("Started run");
    assert!(wait_for_pid(&state, &id), "run should record its pid");

    state
        .orq()
        .args(&["job", "stop", &id])
        .passes()
        .stdout_has("Stopped run");

    state
        .orq()
        .args(&["run", "list", &id])
        .passes()
        .stdout_has("failed");
}

#[test]
fn busy_job_refuses_second_run() {
    let state = State::with_shell_interpreter();
    let id = state.add_job(&["slow", "-s", "daily", "--at", "09:00", "--entrypoint", "main.sh"]);
    state.file(state.workspace(id).join("main.sh"), "sleep 30\n");
    let id = id.to_string();

    state.orq().args(&["job", "run", &id]).passes();
    assert!(wait_for_pid(&state, &id), "run should record its pid");
    state
        .orq()
        .args(&["job", "run", &id])
        .fails()
        .stderr_has("is busy with run");

    state.orq().args(&["job", "stop", &id]).passes();
}
