// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Encrypted credential records.
//!
//! Values are stored as vault ciphertext only; the plaintext never reaches
//! the store or the log.

use crate::id::ServerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of secret kinds the vault accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    TailscaleToken,
    SshPrivateKey,
    SshUsername,
    SudoPassword,
    SshPassword,
}

impl CredentialType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TailscaleToken => "tailscale_token",
            Self::SshPrivateKey => "ssh_private_key",
            Self::SshUsername => "ssh_username",
            Self::SudoPassword => "sudo_password",
            Self::SshPassword => "ssh_password",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored secret, global (`server_id: None`) or bound to one server.
/// At most one row exists per `(credential_type, server_id)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub credential_type: CredentialType,
    pub server_id: Option<ServerId>,
    pub encrypted_value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
