// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

use crate::subprocess::{INSTALL_TIMEOUT, VENV_CREATE_TIMEOUT};
use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for `-m venv` (default: 120s).
pub fn venv_timeout() -> Duration {
    parse_duration_ms("ORQ_VENV_TIMEOUT_MS").unwrap_or(VENV_CREATE_TIMEOUT)
}

/// Timeout for each `pip install` step (default: 900s).
pub fn install_timeout() -> Duration {
    parse_duration_ms("ORQ_INSTALL_TIMEOUT_MS").unwrap_or(INSTALL_TIMEOUT)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
