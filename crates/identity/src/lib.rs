// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity and credential lifecycle for the hub.
//!
//! Three services live here, all backed by the store:
//! [`CredentialVault`] keeps secrets encrypted at rest, [`TokenAuthority`]
//! owns registration and per-agent token lifecycles, and [`HostKeyStore`]
//! implements trust-on-first-use for SSH host keys.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod host_keys;
mod tokens;
mod vault;

pub use host_keys::{compute_fingerprint, HostKeyStore};
pub use tokens::{
    generate_agent_token, generate_registration_token, AgentAuthError, AgentConfigDoc,
    ClaimOutcome, CommandExecutionDoc, GeneratedToken, RegistrationCheck, TokenAuthority,
    TokenError, AGENT_TOKEN_PREFIX, REGISTRATION_TOKEN_PREFIX,
};
pub use vault::{CredentialScope, CredentialVault, VaultError};
