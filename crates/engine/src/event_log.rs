// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit trail

use orq_core::{Clock, Event, NewEvent};
use orq_storage::{JobStore, StoreError};
use std::sync::Arc;

/// Records audit events in the store and mirrors them to the daemon log.
#[derive(Clone)]
pub struct EventLog<C: Clock> {
    store: Arc<dyn JobStore>,
    clock: C,
}

impl<C: Clock> EventLog<C> {
    pub fn new(store: Arc<dyn JobStore>, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn record(&self, event: NewEvent) -> Result<Event, StoreError> {
        let event = self.store.record_event(event, self.clock.now())?;
        tracing::info!(
            kind = %event.kind,
            job_id = ?event.job_id.map(|id| id.get()),
            run_id = ?event.run_id.map(|id| id.get()),
            actor = event.actor.as_deref().unwrap_or("-"),
            "{}",
            event.message
        );
        Ok(event)
    }

    /// Record an event where failing to do so must not abort the caller.
    pub fn record_or_warn(&self, event: NewEvent) {
        let kind = event.kind;
        if let Err(e) = self.record(event) {
            tracing::warn!(%kind, error = %e, "failed to record event");
        }
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
