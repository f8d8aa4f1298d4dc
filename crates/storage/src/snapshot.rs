// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for crash recovery.
//!
//! Snapshots store the complete materialized state at a point in time,
//! identified by the WAL sequence number. Recovery loads the snapshot and
//! replays WAL entries after that sequence.

use crate::state::MaterializedState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current snapshot schema version
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;
/// How many previous snapshot generations survive as backups.
const BACKUP_GENERATIONS: u32 = 3;

/// Errors that can occur in snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

/// A snapshot of the materialized state at a point in time.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version for migrations
    #[serde(rename = "v")]
    pub version: u32,
    /// WAL sequence number at the time of snapshot
    pub seq: u64,
    /// The complete materialized state
    pub state: MaterializedState,
    /// When this snapshot was created
    pub created_at: DateTime<Utc>,
}

/// Append a suffix to the full file name (`snapshot.json.zst` +
/// `.bak.2` -> `snapshot.json.zst.bak.2`).
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Backup slot for generation `n`: `snapshot.json.zst.bak` for the
/// newest, then `snapshot.json.zst.bak.2` and `.zst.bak.3`.
fn backup_path(path: &Path, n: u32) -> PathBuf {
    if n == 1 {
        sibling(path, ".bak")
    } else {
        sibling(path, &format!(".bak.{n}"))
    }
}

/// Shift existing backups one generation older, dropping the one past
/// [`BACKUP_GENERATIONS`], and return the freed newest slot.
fn rotate_backups(path: &Path) -> PathBuf {
    let _ = fs::remove_file(backup_path(path, BACKUP_GENERATIONS));
    for n in (1..BACKUP_GENERATIONS).rev() {
        let from = backup_path(path, n);
        if from.exists() {
            let _ = fs::rename(&from, backup_path(path, n + 1));
        }
    }
    backup_path(path, 1)
}

impl Snapshot {
    pub fn new(seq: u64, state: MaterializedState, created_at: DateTime<Utc>) -> Self {
        Self { version: CURRENT_SNAPSHOT_VERSION, seq, state, created_at }
    }

    /// Write the snapshot atomically: compress to a `.tmp` sibling, move
    /// the previous snapshot into the `.zst.bak` chain, then rename.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let tmp = sibling(path, ".tmp");
        {
            let file = File::create(&tmp)?;
            let writer = zstd::stream::write::Encoder::new(BufWriter::new(file), ZSTD_LEVEL)?
                .auto_finish();
            serde_json::to_writer(writer, self)?;
        }
        if path.exists() {
            let _ = fs::rename(path, rotate_backups(path));
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a snapshot, or `None` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let reader = zstd::stream::read::Decoder::new(BufReader::new(file))?;
        let snapshot: Snapshot = serde_json::from_reader(reader)?;
        if snapshot.version > CURRENT_SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
