// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registration-token and agent-credential records.
//!
//! Only SHA-256 digests of token plaintexts are ever stored; the display
//! prefix (first 16 characters) is kept so operators can tell tokens apart.

use crate::id::{MachineGuid, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agent operating mode requested when a registration token is minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    #[default]
    Readonly,
    Readwrite,
}

/// Single-use credential minted by an operator for a new agent.
/// Claim is terminal; an expired or claimed token can never mint again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationToken {
    pub id: u64,
    /// SHA-256 hex digest of the plaintext (`hlh_rt_` + 64 hex).
    pub token_hash: String,
    /// First 16 characters of the plaintext, for display.
    pub prefix: String,
    pub mode: TokenMode,
    pub display_name: Option<String>,
    pub monitored_services: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by_server_id: Option<ServerId>,
}

impl RegistrationToken {
    pub fn is_claimed(&self) -> bool {
        self.claimed_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The long-lived per-agent API token. At most one non-revoked credential
/// exists per server GUID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCredential {
    pub server_guid: MachineGuid,
    /// SHA-256 hex digest of the plaintext
    /// (`hlh_ag_` + guid[..8] + `_` + 64 hex).
    pub api_token_hash: String,
    pub api_token_prefix: String,
    pub is_legacy: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AgentCredential {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}
