//! Job management specs
//!
//! Create, list, pause, edit and reset jobs through the CLI.

use crate::prelude::*;

#[test]
fn add_creates_scheduled_job_with_workspace() {
    let state = State::empty();

    state
        .orq()
        .args(&["job", "add", "report", "-s", "daily", "--at", "09:00"])
        .passes()
        .stdout_has("Created job 1 (report)")
        .stdout_has("daily at 09:00");

    let workspace = state.workspace(1);
    assert!(workspace.join("inputs").is_dir());
    assert!(workspace.join("outputs").is_dir());
    assert!(workspace.join("README.txt").is_file());
}

#[test]
fn list_shows_jobs_in_a_table() {
    let state = State::empty();
    state.add_job(&["alpha", "-s", "interval", "--every", "15"]);
    state.add_job(&["beta", "-s", "multi-daily", "--at", "18:00,06:00", "--isolated"]);

    state
        .orq()
        .args(&["job", "list"])
        .passes()
        .stdout_has("NAME")
        .stdout_has("alpha")
        .stdout_has("every 15m")
        .stdout_has("daily at 06:00, 18:00")
        .stdout_has("main.py (isolated)");
}

#[test]
fn pause_clears_next_due_and_resume_restores_it() {
    let state = State::empty();
    let id = state.add_job(&["poller", "-s", "interval", "--every", "5"]);
    let id = id.to_string();

    let paused = state.orq().args(&["-o", "json", "job", "pause", &id]).passes().json();
    assert_eq!(paused["paused"], true);
    assert!(paused["next_due"].is_null());

    let resumed = state.orq().args(&["-o", "json", "job", "resume", &id]).passes().json();
    assert_eq!(resumed["paused"], false);
    assert!(resumed["next_due"].is_string());
}

#[test]
fn deactivated_job_is_listed_as_inactive() {
    let state = State::empty();
    let id = state.add_job(&["old", "-s", "daily", "--at", "12:00"]);

    state
        .orq()
        .args(&["job", "deactivate", &id.to_string()])
        .passes()
        .stdout_has("Deactivated job");
    state
        .orq()
        .args(&["job", "list"])
        .passes()
        .stdout_has("inactive");
}

#[test]
fn edit_keeps_schedule_kind() {
    let state = State::empty();
    let id = state.add_job(&["report", "-s", "daily", "--at", "09:00"]);

    state
        .orq()
        .args(&["job", "edit", &id.to_string(), "--at", "10:30", "--name", "late-report"])
        .passes()
        .stdout_has("Updated job")
        .stdout_has("late-report")
        .stdout_has("daily at 10:30");
}

#[test]
fn changes_are_audited() {
    let state = State::empty();
    let id = state.add_job(&["report", "-s", "daily", "--at", "09:00"]);

    state
        .orq()
        .env("ORQ_ACTOR", "alice")
        .args(&["job", "pause", &id.to_string()])
        .passes();

    state
        .orq()
        .args(&["events", "--job", &id.to_string()])
        .passes()
        .stdout_has("next_due_recomputed")
        .stdout_has("alice")
        .stdout_has("job paused");
}

#[test]
fn workspace_reset_keeps_named_entries() {
    let state = State::empty();
    let id = state.add_job(&["report", "-s", "daily", "--at", "09:00"]);
    state.file(state.workspace(id).join("main.sh"), "echo hi\n");
    state.file(state.workspace(id).join("scratch.txt"), "tmp\n");

    state
        .orq()
        .args(&["workspace", "reset", &id.to_string(), "--keep", "main.sh"])
        .passes()
        .stdout_has("4 removed");

    let workspace = state.workspace(id);
    assert!(workspace.join("main.sh").is_file());
    assert!(!workspace.join("scratch.txt").exists());
    assert!(workspace.join("inputs").is_dir(), "scaffold is recreated");
}

#[test]
fn environment_reset_without_environment() {
    let state = State::empty();
    let id = state.add_job(&["report", "-s", "daily", "--at", "09:00", "--isolated"]);

    state
        .orq()
        .args(&["env", "reset", &id.to_string()])
        .passes()
        .stdout_has("has no environment");
}
