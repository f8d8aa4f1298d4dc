// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine identifiers.
//!
//! `ServerId` is the operator-chosen slug; `MachineGuid` is the permanent
//! UUIDv4 identity that survives hostname and IP changes. Both are
//! validated at the boundary so the rest of the hub can treat them as
//! well-formed.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use uuid::Uuid;

/// Errors from identifier validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid server id {0:?}: must match ^[a-z0-9]([a-z0-9-]*[a-z0-9])?$")]
    InvalidServerId(String),
    #[error("invalid machine guid {0:?}: must be a lowercase UUIDv4")]
    InvalidGuid(String),
}

#[allow(clippy::unwrap_used)] // pattern is a compile-time constant
fn server_id_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap()
    })
}

#[allow(clippy::unwrap_used)] // pattern is a compile-time constant
fn guid_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(
            r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$",
        )
        .unwrap()
    })
}

/// Stable slug identifier for a managed server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct ServerId(String);

impl TryFrom<String> for ServerId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl ServerId {
    /// Validate and wrap a slug. Lowercase alphanumeric with interior
    /// hyphens; single characters are allowed.
    pub fn parse(s: impl Into<String>) -> Result<Self, IdError> {
        let s = s.into();
        if server_id_re().is_match(&s) {
            Ok(Self(s))
        } else {
            Err(IdError::InvalidServerId(s))
        }
    }

    /// Derive a slug from a hostname (`omv media.lan` → `omv-media-lan`).
    pub fn from_hostname(hostname: &str) -> Result<Self, IdError> {
        let mut slug: String = hostname
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        while slug.contains("--") {
            slug = slug.replace("--", "-");
        }
        Self::parse(slug.trim_matches('-').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ServerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for ServerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Permanent UUIDv4 identity of an agent-managed machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct MachineGuid(String);

impl TryFrom<String> for MachineGuid {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl MachineGuid {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(s: impl Into<String>) -> Result<Self, IdError> {
        let s = s.into();
        if guid_re().is_match(&s) {
            Ok(Self(s))
        } else {
            Err(IdError::InvalidGuid(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used in agent token plaintexts.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for MachineGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for MachineGuid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
