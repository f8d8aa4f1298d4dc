// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store facade.
//!
//! `HubStore` owns the materialized state and the WAL behind one lock.
//! `commit` is the transactional primitive: the closure inspects current
//! state (and may mutate the runtime-only evaluation state), returns the
//! events that make up the transaction, and those are logged and applied
//! before the lock is released. Either the whole batch reaches the WAL or
//! none of it does.
//!
//! The lock is a plain (non-async) mutex and must never be held across an
//! await point; all remote I/O happens outside `commit`.

use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use chrono::{DateTime, Utc};
use hlh_core::Event;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const SNAPSHOT_FILE: &str = "snapshot.json.zst";
const WAL_FILE: &str = "events.wal";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

struct Inner {
    state: MaterializedState,
    wal: Wal,
    snapshot_path: PathBuf,
}

/// Handle to the hub's persistent state. Cheap to clone.
#[derive(Clone)]
pub struct HubStore {
    inner: Arc<Mutex<Inner>>,
}

impl HubStore {
    /// Open the store in `dir`, creating it if needed. Recovery loads the
    /// snapshot (if any) and replays the WAL tail past its sequence.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let wal_path = dir.join(WAL_FILE);

        let (mut state, base_seq) = match Snapshot::load(&snapshot_path)? {
            Some(snapshot) => (snapshot.state, snapshot.seq),
            None => (MaterializedState::new(), 0),
        };

        let tail = Wal::replay(&wal_path, base_seq)?;
        let replayed = tail.len();
        for entry in tail {
            state.apply(&entry.event);
        }
        let wal = Wal::open(&wal_path, base_seq)?;

        tracing::info!(
            dir = %dir.display(),
            snapshot_seq = base_seq,
            replayed,
            servers = state.servers.len(),
            "store opened"
        );

        Ok(Self { inner: Arc::new(Mutex::new(Inner { state, wal, snapshot_path })) })
    }

    /// Read access to the materialized state.
    pub fn read<R>(&self, f: impl FnOnce(&MaterializedState) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.state)
    }

    /// Atomic read-compute-commit.
    ///
    /// The closure may mutate runtime-only fields (the alert evaluation
    /// state) directly; every persistent change must be returned as events.
    /// The batch is appended to the WAL with a single flush and applied to
    /// the state before the lock is released.
    pub fn commit<R>(
        &self,
        f: impl FnOnce(&mut MaterializedState) -> (Vec<Event>, R),
    ) -> Result<R, StoreError> {
        let mut inner = self.inner.lock();
        let (events, out) = f(&mut inner.state);
        if !events.is_empty() {
            inner.wal.append_batch(&events)?;
            for event in &events {
                tracing::debug!(event = event.name(), "committed");
            }
            for event in &events {
                inner.state.apply(event);
            }
        }
        Ok(out)
    }

    /// Write a snapshot of the current state and truncate the WAL.
    pub fn checkpoint(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let seq = inner.wal.write_seq();
        // Runtime-only fields are serde(skip), so the snapshot holds
        // exactly the replayable state.
        let snapshot_path = inner.snapshot_path.clone();
        Snapshot::new(seq, inner.state.clone(), now).save(&snapshot_path)?;
        inner.wal.truncate()?;
        tracing::info!(seq, "checkpoint written");
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
