// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use yare::parameterized;

#[test]
#[serial]
fn styles_are_plain_when_no_color() {
    std::env::set_var("NO_COLOR", "1");
    std::env::remove_var("COLOR");

    let s = styles();

    assert_eq!(format!("{:?}", s), format!("{:?}", Styles::plain()));
    std::env::remove_var("NO_COLOR");
}

#[test]
#[serial]
fn styles_are_colored_when_forced() {
    std::env::remove_var("NO_COLOR");
    std::env::set_var("COLOR", "1");

    let s = styles();

    assert_ne!(format!("{:?}", s), format!("{:?}", Styles::plain()));
    std::env::remove_var("COLOR");
}

#[test]
#[serial]
fn no_color_wins_over_force() {
    std::env::set_var("NO_COLOR", "1");
    std::env::set_var("COLOR", "1");

    assert!(!should_colorize());
    assert_eq!(header("JOBS"), "JOBS");
    std::env::remove_var("NO_COLOR");
    std::env::remove_var("COLOR");
}

#[test]
#[serial]
fn header_and_muted_use_palette_when_forced() {
    std::env::remove_var("NO_COLOR");
    std::env::set_var("COLOR", "1");

    assert_eq!(header("ID"), "\x1b[38;5;74mID\x1b[0m");
    assert_eq!(muted("-"), "\x1b[38;5;240m-\x1b[0m");
    std::env::remove_var("COLOR");
}

#[parameterized(
    success = { "success", "\x1b[32m" },
    active = { "active", "\x1b[32m" },
    running = { "running", "\x1b[33m" },
    paused = { "paused", "\x1b[33m" },
    failed = { "failed", "\x1b[31m" },
    padded_failed = { "failed   ", "\x1b[31m" },
)]
fn apply_status_colors_known_words(text: &str, code: &str) {
    let colored = apply_status(text);

    assert!(colored.starts_with(code), "{colored:?}");
    assert!(colored.contains(text));
    assert!(colored.ends_with(RESET));
}

#[test]
fn apply_status_leaves_unknown_words() {
    assert_eq!(apply_status("scheduled"), "scheduled");
}
