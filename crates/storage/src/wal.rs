// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event log.
//!
//! One JSON object per line: `{"seq": 7, "event": {"type": ...}}`. Appends
//! within a batch share a single flush so a multi-event transaction hits
//! the disk together.

use hlh_core::Event;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt WAL entry at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
}

/// One logged event with its sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Append-only write-ahead log backed by a single file.
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    write_seq: u64,
}

impl Wal {
    /// Open (or create) the log at `path`. `base_seq` is the sequence the
    /// snapshot already covers; existing entries are scanned to find the
    /// true tail so appends continue from the right number.
    pub fn open(path: &Path, base_seq: u64) -> Result<Self, WalError> {
        let mut write_seq = base_seq;
        if path.exists() {
            for entry in Self::replay(path, 0)? {
                write_seq = write_seq.max(entry.seq);
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { path: path.to_path_buf(), writer: BufWriter::new(file), write_seq })
    }

    /// Highest sequence number written so far.
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a batch of events and flush once. Returns the sequence of
    /// the last entry written.
    pub fn append_batch(&mut self, events: &[Event]) -> Result<u64, WalError> {
        for event in events {
            self.write_seq += 1;
            let entry = WalEntry { seq: self.write_seq, event: event.clone() };
            serde_json::to_writer(&mut self.writer, &entry)?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        Ok(self.write_seq)
    }

    /// Read all entries with `seq > after_seq`, in order.
    ///
    /// A torn final line (crash mid-append) is tolerated and dropped with
    /// a warning; corruption anywhere else is an error.
    pub fn replay(path: &Path, after_seq: u64) -> Result<Vec<WalEntry>, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);
        let mut entries: Vec<WalEntry> = Vec::new();
        let mut lines = reader.lines().enumerate().peekable();
        while let Some((idx, line)) = lines.next() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(&line) {
                Ok(entry) => {
                    if entry.seq > after_seq {
                        entries.push(entry);
                    }
                }
                Err(e) if lines.peek().is_none() => {
                    // Torn tail from an interrupted append; everything
                    // before it is intact.
                    tracing::warn!(line = idx + 1, error = %e, "dropping torn WAL tail");
                }
                Err(e) => {
                    return Err(WalError::Corrupt { line: idx + 1, reason: e.to_string() });
                }
            }
        }
        Ok(entries)
    }

    /// Truncate the log after a snapshot has captured its contents.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
