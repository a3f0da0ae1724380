//! Daemon logs specs

use crate::prelude::*;

#[test]
fn logs_show_startup_marker() {
    let state = State::empty();
    state.orq().args(&["daemon", "start"]).passes();

    state
        .orq()
        .args(&["daemon", "logs", "-n", "10"])
        .passes()
        .stdout_has("orqd: starting");
}

#[test]
fn logs_show_ready_line() {
    let state = State::empty();
    state.orq().args(&["daemon", "start"]).passes();

    // The tracing appender is non-blocking, so "Daemon ready" may land on
    // disk after `daemon start` returns.
    let ready = wait_for(SPEC_WAIT_MAX_MS, || {
        state
            .orq()
            .args(&["daemon", "logs"])
            .passes()
            .stdout()
            .contains("Daemon ready")
    });
    assert!(ready, "daemon log should contain 'Daemon ready'");
}

#[test]
fn logs_without_file() {
    let state = State::empty();
    state
        .orq()
        .args(&["daemon", "logs"])
        .passes()
        .stdout_has("No log file found");
}
