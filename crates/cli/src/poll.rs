// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polling loop used while waiting on a run.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

/// Default delay between polls of the daemon
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Outcome of waiting for the next poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Ready,
    /// The deadline passed
    Timeout,
    /// Ctrl+C was pressed
    Interrupted,
}

/// Interval timer with an optional deadline and Ctrl+C handling.
pub struct Poller {
    interval: Duration,
    deadline: Option<Instant>,
    ctrl_c: Pin<Box<dyn Future<Output = std::io::Result<()>>>>,
}

impl Poller {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self {
            interval,
            deadline: timeout.map(|t| Instant::now() + t),
            ctrl_c: Box::pin(tokio::signal::ctrl_c()),
        }
    }

    /// Poller using `ORQ_WAIT_POLL_MS` (or the default) as interval.
    pub fn from_env(timeout: Option<Duration>) -> Self {
        Self::new(
            crate::env::wait_poll_ms().unwrap_or(DEFAULT_INTERVAL),
            timeout,
        )
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Sleep one interval. The deadline is checked before and after sleeping.
    pub async fn tick(&mut self) -> Tick {
        if self.expired() {
            return Tick::Timeout;
        }

        tokio::select! {
            _ = &mut self.ctrl_c => Tick::Interrupted,
            _ = tokio::time::sleep(self.interval) => {
                if self.expired() {
                    Tick::Timeout
                } else {
                    Tick::Ready
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
