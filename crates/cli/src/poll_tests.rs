// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn ready_before_deadline() {
    let mut poller = Poller::new(Duration::from_millis(10), Some(Duration::from_secs(5)));

    for _ in 0..3 {
        assert_eq!(poller.tick().await, Tick::Ready);
    }
}

#[tokio::test]
async fn timeout_when_deadline_passes_during_sleep() {
    let mut poller = Poller::new(Duration::from_millis(50), Some(Duration::from_millis(1)));

    assert_eq!(poller.tick().await, Tick::Timeout);
}

#[tokio::test]
async fn timeout_when_already_expired() {
    let mut poller = Poller::new(Duration::from_millis(10), Some(Duration::ZERO));

    assert_eq!(poller.tick().await, Tick::Timeout);
}

#[tokio::test]
async fn no_deadline_polls_indefinitely() {
    let mut poller = Poller::new(Duration::from_millis(5), None);

    for _ in 0..5 {
        assert_eq!(poller.tick().await, Tick::Ready);
    }
}
