// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trust-on-first-use host key store.
//!
//! The SSH layer asks this store to vet every peer key it sees. First
//! contact stores the key; any later fingerprint mismatch is surfaced by
//! the caller as a security event and is never auto-accepted.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hlh_core::{Clock, Event, HostKey, ServerId};
use hlh_storage::{HubStore, StoreError};
use sha2::{Digest, Sha256};

/// `SHA256:` + base64(sha256(raw key bytes)), padding stripped. The same
/// format OpenSSH prints.
pub fn compute_fingerprint(key_bytes: &[u8]) -> String {
    let digest = Sha256::digest(key_bytes);
    format!("SHA256:{}", STANDARD_NO_PAD.encode(digest))
}

/// TOFU storage for remote SSH host keys, one per machine.
pub struct HostKeyStore<C: Clock> {
    store: HubStore,
    clock: C,
}

impl<C: Clock> HostKeyStore<C> {
    pub fn new(store: HubStore, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn get(&self, machine_id: &ServerId) -> Option<HostKey> {
        self.store.read(|s| s.host_key(machine_id).cloned())
    }

    /// Record the key seen on first contact.
    pub fn store_key(
        &self,
        machine_id: &ServerId,
        hostname: &str,
        key_type: &str,
        public_key: &str,
        fingerprint: &str,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let record = HostKey {
            machine_id: machine_id.clone(),
            hostname: hostname.to_string(),
            key_type: key_type.to_string(),
            public_key: public_key.to_string(),
            fingerprint: fingerprint.to_string(),
            first_seen: now,
            last_seen: now,
        };
        self.store.commit(|_| (vec![Event::HostKeyStored { record }], ()))?;
        tracing::info!(machine_id = %machine_id, %fingerprint, "host key trusted on first use");
        Ok(())
    }

    pub fn update_last_seen(&self, machine_id: &ServerId) -> Result<(), StoreError> {
        let at: DateTime<Utc> = self.clock.now();
        self.store
            .commit(|_| (vec![Event::HostKeySeen { machine_id: machine_id.clone(), at }], ()))
    }
}

#[cfg(test)]
#[path = "host_keys_tests.rs"]
mod tests;
