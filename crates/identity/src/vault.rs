// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Symmetric credential vault.
//!
//! Secrets are encrypted with a single hub-wide AES-256-GCM key supplied
//! out of band (environment variable at startup). Ciphertexts are
//! url-safe base64 of `[version][timestamp][nonce][ciphertext+tag]`; the
//! key itself is never stored by the vault.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, Utc};
use hlh_core::{Clock, Credential, CredentialType, ServerId};
use hlh_storage::{HubStore, StoreError};
use rand::RngCore;
use thiserror::Error;

const TOKEN_VERSION: u8 = 0x01;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Startup-fatal: the configured key is not url-safe base64 of 32 bytes.
    #[error("invalid encryption key format: expected url-safe base64 of {KEY_LEN} bytes")]
    InvalidKey,
    #[error("credential value must not be empty")]
    EmptyValue,
    #[error("encryption failure")]
    Encryption,
    /// The ciphertext cannot be decrypted with the configured key. The
    /// caller re-enters the credential; nothing is retried.
    #[error("cannot decrypt {credential_type} credential: wrong key or corrupt ciphertext")]
    Decryption { credential_type: CredentialType },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where an effective credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScope {
    PerServer,
    Global,
    None,
}

/// Encrypt-at-rest store for operator secrets.
pub struct CredentialVault<C: Clock> {
    store: HubStore,
    cipher: Aes256Gcm,
    clock: C,
}

impl<C: Clock> CredentialVault<C> {
    /// Build the vault from the url-safe base64 key. An unusable key is
    /// fatal; the hub must not run half-encrypted.
    pub fn new(store: HubStore, key: &str, clock: C) -> Result<Self, VaultError> {
        let bytes = URL_SAFE.decode(key.trim()).map_err(|_| VaultError::InvalidKey)?;
        if bytes.len() != KEY_LEN {
            return Err(VaultError::InvalidKey);
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&bytes));
        Ok(Self { store, cipher, clock })
    }

    /// Generate a fresh vault key (url-safe base64, 32 bytes).
    pub fn generate_key() -> String {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        URL_SAFE.encode(bytes)
    }

    /// Store or replace a secret. Upserts by `(type, server_id)`.
    pub fn store(
        &self,
        credential_type: CredentialType,
        value: &str,
        server_id: Option<&ServerId>,
    ) -> Result<(), VaultError> {
        if value.trim().is_empty() {
            return Err(VaultError::EmptyValue);
        }
        let now = self.clock.now();
        let encrypted_value = self.encrypt(value, now)?;
        let record = Credential {
            credential_type,
            server_id: server_id.cloned(),
            encrypted_value,
            created_at: now,
            updated_at: now,
        };
        self.store.commit(|_| (vec![hlh_core::Event::CredentialStored { record }], ()))?;
        tracing::info!(%credential_type, scoped = server_id.is_some(), "credential stored");
        Ok(())
    }

    /// Decrypt the credential at exactly this scope. No fallback.
    pub fn get(
        &self,
        credential_type: CredentialType,
        server_id: Option<&ServerId>,
    ) -> Result<Option<String>, VaultError> {
        let ciphertext = self
            .store
            .read(|s| s.credential(credential_type, server_id).map(|c| c.encrypted_value.clone()));
        match ciphertext {
            Some(ct) => self.decrypt(&ct, credential_type).map(Some),
            None => Ok(None),
        }
    }

    /// Per-server value if present, else the global one. Never mixes.
    pub fn effective(
        &self,
        credential_type: CredentialType,
        server_id: &ServerId,
    ) -> Result<Option<String>, VaultError> {
        if let Some(value) = self.get(credential_type, Some(server_id))? {
            return Ok(Some(value));
        }
        self.get(credential_type, None)
    }

    /// Which scope `effective` would resolve to for this server.
    pub fn scope(&self, credential_type: CredentialType, server_id: &ServerId) -> CredentialScope {
        self.store.read(|s| {
            if s.credential(credential_type, Some(server_id)).is_some() {
                CredentialScope::PerServer
            } else if s.credential(credential_type, None).is_some() {
                CredentialScope::Global
            } else {
                CredentialScope::None
            }
        })
    }

    pub fn exists(&self, credential_type: CredentialType, server_id: Option<&ServerId>) -> bool {
        self.store.read(|s| s.credential(credential_type, server_id).is_some())
    }

    /// Remove a credential; returns whether one existed.
    pub fn delete(
        &self,
        credential_type: CredentialType,
        server_id: Option<&ServerId>,
    ) -> Result<bool, VaultError> {
        let deleted = self.store.commit(|state| {
            if state.credential(credential_type, server_id).is_none() {
                return (vec![], false);
            }
            (
                vec![hlh_core::Event::CredentialDeleted {
                    credential_type,
                    server_id: server_id.cloned(),
                }],
                true,
            )
        })?;
        Ok(deleted)
    }

    fn encrypt(&self, plaintext: &str, now: DateTime<Utc>) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let sealed =
            self.cipher.encrypt(nonce, plaintext.as_bytes()).map_err(|_| VaultError::Encryption)?;

        let timestamp = now.timestamp().max(0) as u64;
        let mut token = Vec::with_capacity(1 + 8 + NONCE_LEN + sealed.len());
        token.push(TOKEN_VERSION);
        token.extend_from_slice(&timestamp.to_be_bytes());
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&sealed);
        Ok(URL_SAFE.encode(token))
    }

    fn decrypt(
        &self,
        ciphertext: &str,
        credential_type: CredentialType,
    ) -> Result<String, VaultError> {
        let fail = || VaultError::Decryption { credential_type };
        let raw = URL_SAFE.decode(ciphertext).map_err(|_| fail())?;
        if raw.len() < 1 + 8 + NONCE_LEN || raw[0] != TOKEN_VERSION {
            return Err(fail());
        }
        let nonce = Nonce::from_slice(&raw[9..9 + NONCE_LEN]);
        let sealed = &raw[9 + NONCE_LEN..];
        let plain = self.cipher.decrypt(nonce, sealed).map_err(|_| fail())?;
        String::from_utf8(plain).map_err(|_| fail())
    }
}

#[cfg(test)]
#[path = "vault_tests.rs"]
mod tests;
