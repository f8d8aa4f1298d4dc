// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH-layer error kinds.
//!
//! Each kind maps to a distinct handling policy: only `Connection` is
//! retried at the connect layer; `HostKeyChanged` is a security event and
//! is never retried.

use hlh_identity::VaultError;
use hlh_storage::StoreError;
use thiserror::Error;

/// Truncate a command for error messages and logs.
fn short_command(command: &str) -> String {
    const MAX: usize = 50;
    if command.len() <= MAX {
        command.to_string()
    } else {
        let mut cut = MAX;
        while !command.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &command[..cut])
    }
}

#[derive(Debug, Error)]
pub enum SshError {
    #[error("no SSH key configured; store one under ssh_private_key or place a key file on disk")]
    KeyNotConfigured,

    #[error("unable to load SSH private key: {0}")]
    KeyParse(String),

    #[error("SSH connection to {hostname} failed after {attempts} attempts: {last_error}")]
    Connection { hostname: String, attempts: u32, last_error: String },

    #[error("authentication failed for {username}@{hostname}")]
    Authentication { hostname: String, username: String },

    #[error(
        "host key changed for {hostname}: expected {stored}, got {presented}; \
         refusing to continue"
    )]
    HostKeyChanged { hostname: String, stored: String, presented: String },

    #[error("command timed out after {timeout_secs}s on {hostname}: {command}")]
    CommandTimeout { hostname: String, command: String, timeout_secs: u64 },

    #[error("transport failure on {hostname}: {message}")]
    Transport { hostname: String, message: String },

    #[error("command cannot be empty")]
    EmptyCommand,

    #[error("server {0} has no hostname, IP, or tailscale hostname configured")]
    NoTarget(String),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SshError {
    pub fn timeout(hostname: &str, command: &str, timeout_secs: u64) -> Self {
        Self::CommandTimeout {
            hostname: hostname.to_string(),
            command: short_command(command),
            timeout_secs,
        }
    }
}
