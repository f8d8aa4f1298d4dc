// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent store for the hub.
//!
//! Every persistent mutation is an [`hlh_core::Event`] appended to a
//! write-ahead log and applied to an in-memory [`MaterializedState`].
//! Snapshots bound recovery time; the WAL tail after the snapshot seq is
//! replayed on startup. [`HubStore`] is the only entry point and gives
//! callers a read view plus an atomic read-compute-commit primitive.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod snapshot;
mod state;
mod store;
mod wal;

pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::MaterializedState;
pub use store::{HubStore, StoreError};
pub use wal::{Wal, WalEntry, WalError};
