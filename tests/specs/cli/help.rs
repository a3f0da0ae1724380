//! CLI help specs
//!
//! Verify help and version output without touching the daemon.

use crate::prelude::*;

#[test]
fn help_lists_commands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("Usage: orq")
        .stdout_has("job")
        .stdout_has("workspace")
        .stdout_has("daemon");
}

#[test]
fn no_arguments_prints_help() {
    let state = State::empty();
    state.orq().passes().stdout_has("Usage: orq");
    assert!(
        !state.path().join("daemon.pid").exists(),
        "help must not start the daemon"
    );
}

#[test]
fn version_names_the_binary() {
    cli().args(&["--version"]).passes().stdout_has("orq ");
}

#[test]
fn job_help_lists_subcommands() {
    cli()
        .args(&["job", "--help"])
        .passes()
        .stdout_has("add")
        .stdout_has("pause")
        .stdout_has("deactivate")
        .stdout_has("run");
}
