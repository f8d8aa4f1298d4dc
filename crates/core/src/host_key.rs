// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trusted SSH host keys (trust-on-first-use).

use crate::id::ServerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The host key trusted for a machine. Exactly one per machine; a
/// fingerprint change is a security event, never an automatic rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostKey {
    pub machine_id: ServerId,
    pub hostname: String,
    pub key_type: String,
    pub public_key: String,
    /// `SHA256:` + base64(sha256(raw key bytes)), padding stripped.
    pub fingerprint: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}
