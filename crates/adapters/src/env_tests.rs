// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn venv_timeout_reads_override() {
    std::env::set_var("ORQ_VENV_TIMEOUT_MS", "2500");
    assert_eq!(venv_timeout(), Duration::from_millis(2500));
    std::env::remove_var("ORQ_VENV_TIMEOUT_MS");
    assert_eq!(venv_timeout(), VENV_CREATE_TIMEOUT);
}

#[test]
#[serial]
fn install_timeout_ignores_garbage() {
    std::env::set_var("ORQ_INSTALL_TIMEOUT_MS", "soon");
    assert_eq!(install_timeout(), INSTALL_TIMEOUT);
    std::env::remove_var("ORQ_INSTALL_TIMEOUT_MS");
}
