// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for orq: the job store interface, its WAL + snapshot
//! implementation, and the materialized state they share.

mod snapshot;
mod state;
mod store;
mod wal;

pub use snapshot::{Snapshot, SnapshotError};
pub use state::{MaterializedState, Pruned, Retention, StoreOp};
pub use store::{JobStore, OpenRun, StoreError, WalStore};
pub use wal::{Wal, WalEntry, WalError};
