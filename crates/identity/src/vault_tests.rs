// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hlh_core::test_support::server_id;
use hlh_core::FakeClock;
use hlh_storage::HubStore;
use tempfile::{tempdir, TempDir};

fn vault() -> (CredentialVault<FakeClock>, HubStore, TempDir) {
    let dir = tempdir().unwrap();
    let store = HubStore::open(dir.path()).unwrap();
    let key = CredentialVault::<FakeClock>::generate_key();
    let vault = CredentialVault::new(store.clone(), &key, FakeClock::new()).unwrap();
    (vault, store, dir)
}

#[test]
fn store_and_get_round_trip() {
    let (vault, _, _dir) = vault();
    vault.store(CredentialType::TailscaleToken, "tskey-auth-abc123", None).unwrap();

    let value = vault.get(CredentialType::TailscaleToken, None).unwrap();
    assert_eq!(value.as_deref(), Some("tskey-auth-abc123"));
}

#[test]
fn ciphertext_is_not_plaintext() {
    let (vault, store, _dir) = vault();
    vault.store(CredentialType::SudoPassword, "hunter2-secret", None).unwrap();

    let stored = store.read(|s| {
        s.credential(CredentialType::SudoPassword, None).unwrap().encrypted_value.clone()
    });
    assert!(!stored.contains("hunter2"));

    // The whole store file must not leak the plaintext either.
    let json = store.read(|s| serde_json::to_string(s).unwrap());
    assert!(!json.contains("hunter2"));
}

#[test]
fn empty_and_whitespace_values_rejected() {
    let (vault, _, _dir) = vault();
    assert!(matches!(
        vault.store(CredentialType::SshPassword, "", None),
        Err(VaultError::EmptyValue)
    ));
    assert!(matches!(
        vault.store(CredentialType::SshPassword, "   \n", None),
        Err(VaultError::EmptyValue)
    ));
}

#[test]
fn invalid_key_is_fatal() {
    let dir = tempdir().unwrap();
    let store = HubStore::open(dir.path()).unwrap();
    for bad in ["not-base64!!!!", "", "c2hvcnQ="] {
        assert!(matches!(
            CredentialVault::new(store.clone(), bad, FakeClock::new()),
            Err(VaultError::InvalidKey)
        ));
    }
}

#[test]
fn get_missing_returns_none() {
    let (vault, _, _dir) = vault();
    assert!(vault.get(CredentialType::SshPrivateKey, None).unwrap().is_none());
}

#[test]
fn upsert_replaces_value() {
    let (vault, _, _dir) = vault();
    vault.store(CredentialType::SshUsername, "admin", None).unwrap();
    vault.store(CredentialType::SshUsername, "ops", None).unwrap();
    assert_eq!(vault.get(CredentialType::SshUsername, None).unwrap().as_deref(), Some("ops"));
}

#[test]
fn effective_prefers_per_server_and_never_mixes() {
    let (vault, _, _dir) = vault();
    let id = server_id("omv-media");

    vault.store(CredentialType::SudoPassword, "global-pw", None).unwrap();
    assert_eq!(
        vault.effective(CredentialType::SudoPassword, &id).unwrap().as_deref(),
        Some("global-pw")
    );
    assert_eq!(vault.scope(CredentialType::SudoPassword, &id), CredentialScope::Global);

    vault.store(CredentialType::SudoPassword, "scoped-pw", Some(&id)).unwrap();
    assert_eq!(
        vault.effective(CredentialType::SudoPassword, &id).unwrap().as_deref(),
        Some("scoped-pw")
    );
    assert_eq!(vault.scope(CredentialType::SudoPassword, &id), CredentialScope::PerServer);

    // `get` at an exact scope does not fall back.
    assert!(vault.get(CredentialType::SudoPassword, Some(&server_id("other"))).unwrap().is_none());
}

#[test]
fn scope_none_when_absent() {
    let (vault, _, _dir) = vault();
    assert_eq!(
        vault.scope(CredentialType::TailscaleToken, &server_id("omv-media")),
        CredentialScope::None
    );
}

#[test]
fn delete_reports_existence() {
    let (vault, _, _dir) = vault();
    vault.store(CredentialType::TailscaleToken, "tskey", None).unwrap();
    assert!(vault.delete(CredentialType::TailscaleToken, None).unwrap());
    assert!(!vault.delete(CredentialType::TailscaleToken, None).unwrap());
    assert!(!vault.exists(CredentialType::TailscaleToken, None));
}

#[test]
fn wrong_key_yields_decryption_error_with_type() {
    let dir = tempdir().unwrap();
    let store = HubStore::open(dir.path()).unwrap();
    let vault_a = CredentialVault::new(
        store.clone(),
        &CredentialVault::<FakeClock>::generate_key(),
        FakeClock::new(),
    )
    .unwrap();
    vault_a.store(CredentialType::SshPrivateKey, "-----BEGIN KEY-----", None).unwrap();

    let vault_b = CredentialVault::new(
        store,
        &CredentialVault::<FakeClock>::generate_key(),
        FakeClock::new(),
    )
    .unwrap();
    match vault_b.get(CredentialType::SshPrivateKey, None) {
        Err(VaultError::Decryption { credential_type }) => {
            assert_eq!(credential_type, CredentialType::SshPrivateKey);
        }
        other => panic!("expected decryption error, got {other:?}"),
    }
}

#[test]
fn generated_keys_are_unique_and_valid() {
    let a = CredentialVault::<FakeClock>::generate_key();
    let b = CredentialVault::<FakeClock>::generate_key();
    assert_ne!(a, b);
    assert_eq!(base64::engine::general_purpose::URL_SAFE.decode(&a).unwrap().len(), 32);
}
