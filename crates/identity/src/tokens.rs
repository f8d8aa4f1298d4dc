// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token lifecycle: registration tokens and per-agent API tokens.
//!
//! Plaintext formats are compatibility-critical:
//! - registration: `hlh_rt_` + 64 hex characters
//! - agent: `hlh_ag_` + first 8 chars of the server GUID + `_` + 64 hex
//!
//! Only SHA-256 digests are persisted. Validation uses a constant-time
//! comparison; a plaintext can be checked with one hash and one lookup.

use chrono::Duration;
use hlh_core::{
    AgentCredential, AgentMode, Clock, Event, ExpectedService, MachineGuid, RegistrationToken,
    ServerId, TokenMode,
};
use hlh_storage::{HubStore, StoreError};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const REGISTRATION_TOKEN_PREFIX: &str = "hlh_rt_";
pub const AGENT_TOKEN_PREFIX: &str = "hlh_ag_";

const DISPLAY_PREFIX_LEN: usize = 16;
const DEFAULT_EXPIRY_MINUTES: i64 = 1440;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("registration token is {0}")]
    Registration(RegistrationCheck),
    #[error("server {0:?} already exists and has an active agent")]
    ServerConflict(ServerId),
    #[error("no agent credential found for guid {0:?}")]
    UnknownGuid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to render agent config: {0}")]
    ConfigRender(#[from] serde_yaml::Error),
}

/// Why a registration token failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationCheck {
    Invalid,
    Expired,
    AlreadyClaimed,
}

impl std::fmt::Display for RegistrationCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Invalid => "invalid",
            Self::Expired => "expired",
            Self::AlreadyClaimed => "already claimed",
        })
    }
}

/// Agent authentication failures. All map to 401 at the boundary; the
/// distinction is for security logging only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentAuthError {
    #[error("unknown or revoked agent credential")]
    UnknownCredential,
    #[error("agent token does not match")]
    TokenMismatch,
    #[error("agent is inactive")]
    InactiveServer,
}

/// A freshly minted token. The plaintext exists only in this value and in
/// the response that carries it to the operator or agent.
#[derive(Debug, Clone)]
pub struct GeneratedToken {
    pub plaintext: String,
    pub token_hash: String,
    pub prefix: String,
}

/// The agent configuration document synthesized on claim.
#[derive(Debug, Clone, Serialize)]
pub struct AgentConfigDoc {
    pub hub_url: String,
    pub server_id: ServerId,
    pub server_guid: MachineGuid,
    pub api_token: String,
    pub heartbeat_interval: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitored_services: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_execution: Option<CommandExecutionDoc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandExecutionDoc {
    pub enabled: bool,
    pub use_sudo: bool,
    pub timeout_seconds: u32,
}

/// Everything a successful claim returns.
#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub server_id: ServerId,
    pub server_guid: MachineGuid,
    pub api_token: String,
    pub config_yaml: String,
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

fn random_hex64() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn generated(plaintext: String) -> GeneratedToken {
    let token_hash = sha256_hex(&plaintext);
    let prefix = plaintext.chars().take(DISPLAY_PREFIX_LEN).collect();
    GeneratedToken { plaintext, token_hash, prefix }
}

/// Generate a registration token plaintext (71 chars).
pub fn generate_registration_token() -> GeneratedToken {
    generated(format!("{REGISTRATION_TOKEN_PREFIX}{}", random_hex64()))
}

/// Generate an agent token plaintext bound to a GUID (80 chars).
pub fn generate_agent_token(guid: &MachineGuid) -> GeneratedToken {
    generated(format!("{AGENT_TOKEN_PREFIX}{}_{}", guid.short(), random_hex64()))
}

/// Owns the entire token lifecycle against the store.
pub struct TokenAuthority<C: Clock> {
    store: HubStore,
    clock: C,
    heartbeat_interval: u32,
}

impl<C: Clock> TokenAuthority<C> {
    pub fn new(store: HubStore, clock: C, heartbeat_interval: u32) -> Self {
        Self { store, clock, heartbeat_interval }
    }

    /// Mint a single-use registration token for a new agent.
    pub fn mint_registration(
        &self,
        mode: TokenMode,
        display_name: Option<String>,
        monitored_services: Vec<String>,
        expiry_minutes: Option<i64>,
    ) -> Result<(RegistrationToken, String), TokenError> {
        let token = generate_registration_token();
        let now = self.clock.now();
        let expires_at = now + Duration::minutes(expiry_minutes.unwrap_or(DEFAULT_EXPIRY_MINUTES));

        let record = self.store.commit(|state| {
            let record = RegistrationToken {
                id: state.allocate_token_id(),
                token_hash: token.token_hash.clone(),
                prefix: token.prefix.clone(),
                mode,
                display_name,
                monitored_services,
                created_at: now,
                expires_at,
                claimed_at: None,
                claimed_by_server_id: None,
            };
            (vec![Event::RegistrationTokenMinted { record: record.clone() }], record)
        })?;

        tracing::info!(prefix = %record.prefix, ?mode, "registration token minted");
        Ok((record, token.plaintext))
    }

    /// Check a registration plaintext without claiming it.
    pub fn validate_registration(
        &self,
        plaintext: &str,
    ) -> Result<RegistrationToken, RegistrationCheck> {
        if !plaintext.starts_with(REGISTRATION_TOKEN_PREFIX) {
            return Err(RegistrationCheck::Invalid);
        }
        let hash = sha256_hex(plaintext);
        let now = self.clock.now();
        self.store.read(|state| {
            let token =
                state.registration_token_by_hash(&hash).ok_or(RegistrationCheck::Invalid)?;
            if token.is_claimed() {
                return Err(RegistrationCheck::AlreadyClaimed);
            }
            if token.is_expired(now) {
                return Err(RegistrationCheck::Expired);
            }
            Ok(token.clone())
        })
    }

    /// Claim a registration token: creates (or reuses) the server, mints
    /// the agent credential, marks the token claimed, and renders the
    /// agent config document. One logical transaction.
    pub fn claim_registration(
        &self,
        plaintext: &str,
        server_id: &ServerId,
        hostname: &str,
        hub_url: &str,
    ) -> Result<ClaimOutcome, TokenError> {
        if !plaintext.starts_with(REGISTRATION_TOKEN_PREFIX) {
            return Err(TokenError::Registration(RegistrationCheck::Invalid));
        }
        let hash = sha256_hex(plaintext);
        let now = self.clock.now();
        let guid = MachineGuid::generate();
        let agent_token = generate_agent_token(&guid);

        let outcome: Result<(RegistrationToken, MachineGuid), TokenError> =
            self.store.commit(|state| {
                let token = match state.registration_token_by_hash(&hash) {
                    Some(t) => t.clone(),
                    None => {
                        return (
                            vec![],
                            Err(TokenError::Registration(RegistrationCheck::Invalid)),
                        )
                    }
                };
                if token.is_claimed() {
                    return (
                        vec![],
                        Err(TokenError::Registration(RegistrationCheck::AlreadyClaimed)),
                    );
                }
                if token.is_expired(now) {
                    return (vec![], Err(TokenError::Registration(RegistrationCheck::Expired)));
                }

                let mut events = Vec::new();
                match state.server(server_id) {
                    Some(existing)
                        if !existing.is_inactive && existing.last_seen.is_some() =>
                    {
                        return (vec![], Err(TokenError::ServerConflict(server_id.clone())));
                    }
                    Some(_) => {
                        // Server exists but has never had (or has lost) a
                        // live agent: reactivate it under the new identity.
                        events.push(Event::ServerReactivated { id: server_id.clone() });
                        events.push(Event::ServerGuidRotated {
                            id: server_id.clone(),
                            guid: guid.clone(),
                        });
                    }
                    None => {
                        events.push(Event::ServerRegistered {
                            id: server_id.clone(),
                            guid: guid.clone(),
                            hostname: Some(hostname.to_string()),
                            display_name: token.display_name.clone(),
                            at: now,
                        });
                    }
                }

                let agent_mode = match token.mode {
                    TokenMode::Readonly => AgentMode::Readonly,
                    TokenMode::Readwrite => AgentMode::Readwrite,
                };
                events.push(Event::ServerInfoUpdated {
                    id: server_id.clone(),
                    os_info: None,
                    cpu_info: None,
                    agent_version: None,
                    agent_mode: Some(agent_mode),
                    reboot_required: None,
                    category: None,
                });

                for name in &token.monitored_services {
                    events.push(Event::ExpectedServiceAdded {
                        service: ExpectedService {
                            server_id: server_id.clone(),
                            service_name: name.clone(),
                            display_name: name.clone(),
                            is_critical: false,
                            enabled: true,
                        },
                    });
                }

                events.push(Event::AgentCredentialCreated {
                    record: AgentCredential {
                        server_guid: guid.clone(),
                        api_token_hash: agent_token.token_hash.clone(),
                        api_token_prefix: agent_token.prefix.clone(),
                        is_legacy: false,
                        created_at: now,
                        last_used_at: None,
                        revoked_at: None,
                    },
                });
                events.push(Event::RegistrationTokenClaimed {
                    id: token.id,
                    server_id: server_id.clone(),
                    at: now,
                });

                (events, Ok((token, guid.clone())))
            })?;
        let (token, guid) = outcome?;

        let config_yaml = self.render_agent_config(&token, server_id, &guid, &agent_token, hub_url)?;

        tracing::info!(
            server_id = %server_id,
            prefix = %token.prefix,
            "registration token claimed"
        );

        Ok(ClaimOutcome {
            server_id: server_id.clone(),
            server_guid: guid,
            api_token: agent_token.plaintext,
            config_yaml,
        })
    }

    /// Validate an agent token against its bound GUID. Constant-time hash
    /// comparison; updates `last_used_at` on success.
    pub fn validate_agent(&self, plaintext: &str, guid: &str) -> Result<(), AgentAuthError> {
        let hash = sha256_hex(plaintext);
        let result = self.store.commit(|state| {
            let Some(cred) = state.active_agent_credential(guid) else {
                return (vec![], Err(AgentAuthError::UnknownCredential));
            };
            let matches: bool =
                cred.api_token_hash.as_bytes().ct_eq(hash.as_bytes()).into();
            if !matches {
                return (vec![], Err(AgentAuthError::TokenMismatch));
            }
            let server_guid = cred.server_guid.clone();
            if state.server_by_guid(guid).is_some_and(|s| s.is_inactive) {
                return (vec![], Err(AgentAuthError::InactiveServer));
            }
            (
                vec![Event::AgentCredentialUsed { server_guid, at: self.clock.now() }],
                Ok(()),
            )
        });
        match result {
            Ok(inner) => inner,
            // A store failure must not grant access.
            Err(e) => {
                tracing::error!(error = %e, "agent validation store failure");
                Err(AgentAuthError::UnknownCredential)
            }
        }
    }

    /// Rotate the agent token for a GUID: revoke the old credential and
    /// mint a replacement in one step. The old token is invalid at once.
    pub fn rotate_agent(&self, guid: &MachineGuid) -> Result<String, TokenError> {
        let now = self.clock.now();
        let token = generate_agent_token(guid);
        let outcome = self.store.commit(|state| {
            if state.active_agent_credential(guid.as_str()).is_none() {
                return (vec![], Err(TokenError::UnknownGuid(guid.to_string())));
            }
            let events = vec![
                Event::AgentCredentialRevoked { server_guid: guid.clone(), at: now },
                Event::AgentCredentialCreated {
                    record: AgentCredential {
                        server_guid: guid.clone(),
                        api_token_hash: token.token_hash.clone(),
                        api_token_prefix: token.prefix.clone(),
                        is_legacy: false,
                        created_at: now,
                        last_used_at: None,
                        revoked_at: None,
                    },
                },
            ];
            (events, Ok(()))
        })?;
        outcome?;
        tracing::info!(guid = %guid, prefix = %token.prefix, "agent token rotated");
        Ok(token.plaintext)
    }

    pub fn revoke_agent(&self, guid: &MachineGuid) -> Result<(), TokenError> {
        let now = self.clock.now();
        let outcome = self.store.commit(|state| {
            if state.active_agent_credential(guid.as_str()).is_none() {
                return (vec![], Err(TokenError::UnknownGuid(guid.to_string())));
            }
            (vec![Event::AgentCredentialRevoked { server_guid: guid.clone(), at: now }], Ok(()))
        })?;
        outcome?;
        tracing::warn!(guid = %guid, "agent credential revoked");
        Ok(())
    }

    fn render_agent_config(
        &self,
        token: &RegistrationToken,
        server_id: &ServerId,
        guid: &MachineGuid,
        agent_token: &GeneratedToken,
        hub_url: &str,
    ) -> Result<String, TokenError> {
        let readwrite = token.mode == TokenMode::Readwrite;
        let doc = AgentConfigDoc {
            hub_url: hub_url.trim_end_matches('/').to_string(),
            server_id: server_id.clone(),
            server_guid: guid.clone(),
            api_token: agent_token.plaintext.clone(),
            heartbeat_interval: self.heartbeat_interval,
            monitored_services: (!token.monitored_services.is_empty())
                .then(|| token.monitored_services.clone()),
            mode: readwrite.then(|| "readwrite".to_string()),
            command_execution: readwrite.then(|| CommandExecutionDoc {
                enabled: true,
                use_sudo: false,
                timeout_seconds: 30,
            }),
        };
        Ok(serde_yaml::to_string(&doc)?)
    }

    /// Constant-time comparison against the configured legacy shared key.
    pub fn validate_legacy_key(&self, presented: &str, configured: Option<&str>) -> bool {
        match configured {
            Some(expected) => presented.as_bytes().ct_eq(expected.as_bytes()).into(),
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
