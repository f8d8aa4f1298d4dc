// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hlh_core::test_support::server_id;
use hlh_core::FakeClock;
use tempfile::tempdir;

#[test]
fn fingerprint_matches_openssh_format() {
    let fp = compute_fingerprint(b"some-raw-key-bytes");
    assert!(fp.starts_with("SHA256:"));
    // 32 bytes -> 43 unpadded base64 chars.
    assert_eq!(fp.len(), "SHA256:".len() + 43);
    assert!(!fp.ends_with('='));

    // Deterministic.
    assert_eq!(fp, compute_fingerprint(b"some-raw-key-bytes"));
    assert_ne!(fp, compute_fingerprint(b"other-key"));
}

#[test]
fn store_then_get() {
    let dir = tempdir().unwrap();
    let store = HubStore::open(dir.path()).unwrap();
    let clock = FakeClock::new();
    let keys = HostKeyStore::new(store, clock.clone());

    assert!(keys.get(&server_id("omv-media")).is_none());

    keys.store_key(&server_id("omv-media"), "omv-media.lan", "ssh-ed25519", "AAAAC3...", "SHA256:abc")
        .unwrap();

    let key = keys.get(&server_id("omv-media")).unwrap();
    assert_eq!(key.key_type, "ssh-ed25519");
    assert_eq!(key.fingerprint, "SHA256:abc");
    assert_eq!(key.first_seen, clock.now());
}

#[test]
fn update_last_seen_keeps_first_seen() {
    let dir = tempdir().unwrap();
    let store = HubStore::open(dir.path()).unwrap();
    let clock = FakeClock::new();
    let keys = HostKeyStore::new(store, clock.clone());

    keys.store_key(&server_id("omv-media"), "omv-media.lan", "ssh-ed25519", "AAAA", "SHA256:abc")
        .unwrap();
    let first = clock.now();

    clock.advance(chrono::Duration::minutes(10));
    keys.update_last_seen(&server_id("omv-media")).unwrap();

    let key = keys.get(&server_id("omv-media")).unwrap();
    assert_eq!(key.first_seen, first);
    assert_eq!(key.last_seen, clock.now());
}
