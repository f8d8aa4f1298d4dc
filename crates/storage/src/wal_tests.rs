// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hlh_core::test_support::server_id;
use std::io::Write as _;
use tempfile::tempdir;

fn test_event(id: &str) -> Event {
    Event::ServerDeleted { id: server_id(id) }
}

#[test]
fn open_creates_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    let wal = Wal::open(&path, 0).unwrap();

    assert!(path.exists());
    assert_eq!(wal.write_seq(), 0);
}

#[test]
fn append_batch_assigns_sequences() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    let seq = wal.append_batch(&[test_event("a"), test_event("b")]).unwrap();
    assert_eq!(seq, 2);

    let entries = Wal::replay(&path, 0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[1].seq, 2);
}

#[test]
fn replay_skips_entries_at_or_before_after_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append_batch(&[test_event("a"), test_event("b"), test_event("c")]).unwrap();

    let entries = Wal::replay(&path, 2).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].seq, 3);
}

#[test]
fn reopen_continues_sequence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append_batch(&[test_event("a")]).unwrap();
    }

    let mut wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 1);
    let seq = wal.append_batch(&[test_event("b")]).unwrap();
    assert_eq!(seq, 2);
}

#[test]
fn open_respects_base_seq_from_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    let mut wal = Wal::open(&path, 40).unwrap();
    let seq = wal.append_batch(&[test_event("a")]).unwrap();
    assert_eq!(seq, 41);
}

#[test]
fn torn_tail_is_dropped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append_batch(&[test_event("a")]).unwrap();
    }
    // Simulate a crash mid-append.
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"{\"seq\":2,\"event\":{\"ty").unwrap();
    drop(file);

    let entries = Wal::replay(&path, 0).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].seq, 1);
}

#[test]
fn corruption_in_the_middle_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    let mut file = File::create(&path).unwrap();
    writeln!(file, "not json at all").unwrap();
    writeln!(
        file,
        "{}",
        serde_json::to_string(&WalEntry { seq: 2, event: test_event("b") }).unwrap()
    )
    .unwrap();
    drop(file);

    assert!(matches!(Wal::replay(&path, 0), Err(WalError::Corrupt { line: 1, .. })));
}

#[test]
fn truncate_resets_file_but_keeps_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append_batch(&[test_event("a"), test_event("b")]).unwrap();
    wal.truncate().unwrap();

    assert!(Wal::replay(&path, 0).unwrap().is_empty());
    let seq = wal.append_batch(&[test_event("c")]).unwrap();
    assert_eq!(seq, 3);
}

#[test]
fn replay_of_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let entries = Wal::replay(&dir.path().join("nope.wal"), 0).unwrap();
    assert!(entries.is_empty());
}
