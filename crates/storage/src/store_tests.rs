// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hlh_core::test_support::{guid, server_id, test_time, TEST_GUID};
use hlh_core::{MetricKey, MetricsSample, ServerStatus};
use tempfile::tempdir;

fn register_event(id: &str) -> Event {
    Event::ServerRegistered {
        id: server_id(id),
        guid: guid(TEST_GUID),
        hostname: Some(format!("{id}.lan")),
        display_name: None,
        at: test_time(),
    }
}

#[test]
fn commit_applies_and_persists() {
    let dir = tempdir().unwrap();
    let store = HubStore::open(dir.path()).unwrap();

    store.commit(|_| (vec![register_event("omv-media")], ())).unwrap();

    assert!(store.read(|s| s.server(&server_id("omv-media")).is_some()));

    // Reopen from disk: WAL replay restores the server.
    drop(store);
    let store = HubStore::open(dir.path()).unwrap();
    assert!(store.read(|s| s.server(&server_id("omv-media")).is_some()));
}

#[test]
fn commit_returns_closure_output() {
    let dir = tempdir().unwrap();
    let store = HubStore::open(dir.path()).unwrap();

    let id = store
        .commit(|state| {
            let id = state.allocate_alert_id();
            (vec![], id)
        })
        .unwrap();
    assert_eq!(id, 1);
}

#[test]
fn empty_commit_writes_nothing() {
    let dir = tempdir().unwrap();
    let store = HubStore::open(dir.path()).unwrap();
    store.commit(|_| (vec![], ())).unwrap();

    let entries = Wal::replay(&dir.path().join("events.wal"), 0).unwrap();
    assert!(entries.is_empty());
}

#[test]
fn multi_event_commit_is_one_batch() {
    let dir = tempdir().unwrap();
    let store = HubStore::open(dir.path()).unwrap();

    store
        .commit(|_| {
            (
                vec![
                    register_event("a"),
                    Event::ServerHeartbeat {
                        id: server_id("a"),
                        at: test_time(),
                        metrics: MetricsSample::default(),
                        updates_available: None,
                        security_updates: None,
                    },
                ],
                (),
            )
        })
        .unwrap();

    let entries = Wal::replay(&dir.path().join("events.wal"), 0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].seq, 2);
    assert!(store.read(|s| s.server(&server_id("a")).map(|x| x.status) == Some(ServerStatus::Online)));
}

#[test]
fn checkpoint_truncates_wal_and_recovers() {
    let dir = tempdir().unwrap();
    let store = HubStore::open(dir.path()).unwrap();

    store.commit(|_| (vec![register_event("a")], ())).unwrap();
    store.checkpoint(test_time()).unwrap();
    store.commit(|_| (vec![register_event("b")], ())).unwrap();

    // WAL holds only the post-checkpoint tail.
    let entries = Wal::replay(&dir.path().join("events.wal"), 0).unwrap();
    assert_eq!(entries.len(), 1);

    drop(store);
    let store = HubStore::open(dir.path()).unwrap();
    store.read(|s| {
        assert!(s.server(&server_id("a")).is_some());
        assert!(s.server(&server_id("b")).is_some());
    });
}

#[test]
fn alert_states_are_lost_across_restart() {
    let dir = tempdir().unwrap();
    let store = HubStore::open(dir.path()).unwrap();
    store
        .commit(|state| {
            state.alert_state_mut(&server_id("a"), &MetricKey::Cpu).consecutive_breaches = 2;
            (vec![register_event("a")], ())
        })
        .unwrap();
    store.checkpoint(test_time()).unwrap();

    drop(store);
    let store = HubStore::open(dir.path()).unwrap();
    assert!(store.read(|s| s.alert_states.is_empty()));
}

#[test]
fn clones_share_state() {
    let dir = tempdir().unwrap();
    let store = HubStore::open(dir.path()).unwrap();
    let other = store.clone();

    store.commit(|_| (vec![register_event("a")], ())).unwrap();
    assert!(other.read(|s| s.server(&server_id("a")).is_some()));
}
