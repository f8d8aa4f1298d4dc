// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single write path for agent-reported state.
//!
//! Every heartbeat is one independent transaction: auto-registration,
//! OS/CPU bookkeeping, category detection, metrics, services and pending
//! packages land in a single commit. Alert evaluation runs in its own
//! commit right after, and notification dispatch happens outside any
//! lock; a notifier failure never reaches the agent.

use hlh_alerting::AlertingEngine;
use hlh_core::{
    detect_category, CategorySource, Clock, Event, HeartbeatError, HeartbeatPayload, HubConfig,
    Server,
};
use hlh_identity::{AgentAuthError, TokenAuthority};
use hlh_notify::Notifier;
use hlh_storage::{HubStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("heartbeat rejected: agent has been removed")]
    InactiveServer,
    #[error(transparent)]
    Validation(#[from] HeartbeatError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Stable code for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) | Self::InactiveServer => "UNAUTHORIZED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Store(_) => "INTERNAL",
        }
    }
}

/// How the agent authenticated this heartbeat.
pub enum AgentAuth<'a> {
    /// `X-Agent-Token` + `X-Server-GUID`.
    Token { token: &'a str, guid: &'a str },
    /// Legacy `X-API-Key` shared secret.
    LegacyKey(&'a str),
}

/// The wire response. `pending_commands` is always empty; synchronous
/// execution is the model, the field is kept for forward compatibility.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HeartbeatResponse {
    pub status: &'static str,
    pub server_registered: bool,
    pub pending_commands: Vec<String>,
}

/// Validates, persists and fans out one heartbeat.
pub struct HeartbeatIngest<C: Clock> {
    store: HubStore,
    tokens: Arc<TokenAuthority<C>>,
    alerting: Arc<AlertingEngine<C>>,
    notifier: Arc<dyn Notifier>,
    config: HubConfig,
    clock: C,
}

impl<C: Clock> HeartbeatIngest<C> {
    pub fn new(
        store: HubStore,
        tokens: Arc<TokenAuthority<C>>,
        alerting: Arc<AlertingEngine<C>>,
        notifier: Arc<dyn Notifier>,
        config: HubConfig,
        clock: C,
    ) -> Self {
        Self { store, tokens, alerting, notifier, config, clock }
    }

    pub async fn ingest(
        &self,
        auth: AgentAuth<'_>,
        payload: &HeartbeatPayload,
    ) -> Result<HeartbeatResponse, IngestError> {
        payload.validate()?;
        self.authenticate(&auth, payload)?;

        let now = self.clock.now();
        let registered = self.persist(payload, now)?;

        let server_name = self.store.read(|s| {
            s.server(&payload.server_id)
                .map(|srv| srv.name().to_string())
                .unwrap_or_else(|| payload.server_id.to_string())
        });

        // Alert evaluation; a failure here must not corrupt the persisted
        // metrics, so it runs in its own commits.
        let mut events = self.alerting.evaluate_heartbeat(
            &payload.server_id,
            &server_name,
            payload.metrics.cpu_percent,
            payload.metrics.memory_percent,
            payload.metrics.disk_percent,
            &self.config.thresholds,
            &self.config.notifications.cooldowns,
        )?;
        if let Some(services) = &payload.services {
            events.extend(self.alerting.evaluate_services(
                &payload.server_id,
                &server_name,
                services,
                &self.config.notifications.cooldowns,
            )?);
        }

        // Dispatch outside any lock; outcomes are logged by the notifier.
        for event in &events {
            self.notifier.send_alert(event, &self.config.notifications).await;
        }

        Ok(HeartbeatResponse {
            status: "ok",
            server_registered: registered,
            pending_commands: Vec::new(),
        })
    }

    fn authenticate(
        &self,
        auth: &AgentAuth<'_>,
        payload: &HeartbeatPayload,
    ) -> Result<(), IngestError> {
        match auth {
            AgentAuth::Token { token, guid } => {
                if payload.server_guid.as_str() != *guid {
                    tracing::warn!(
                        server_id = %payload.server_id,
                        "heartbeat GUID header does not match payload"
                    );
                    return Err(IngestError::Unauthorized("guid mismatch".to_string()));
                }
                self.tokens.validate_agent(token, guid).map_err(|e| {
                    tracing::warn!(server_id = %payload.server_id, error = %e, "agent auth failed");
                    match e {
                        AgentAuthError::InactiveServer => IngestError::InactiveServer,
                        other => IngestError::Unauthorized(other.to_string()),
                    }
                })
            }
            AgentAuth::LegacyKey(key) => {
                if !self.tokens.validate_legacy_key(key, self.config.legacy_api_key.as_deref()) {
                    tracing::warn!(
                        server_id = %payload.server_id,
                        "legacy key auth failed"
                    );
                    return Err(IngestError::Unauthorized("invalid api key".to_string()));
                }
                // Removed agents must not resurrect themselves through the
                // legacy path either.
                let inactive = self
                    .store
                    .read(|s| s.server(&payload.server_id).map(|srv| srv.is_inactive))
                    .unwrap_or(false);
                if inactive {
                    return Err(IngestError::InactiveServer);
                }
                Ok(())
            }
        }
    }

    /// All persistent effects of the heartbeat in one commit.
    fn persist(
        &self,
        payload: &HeartbeatPayload,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, IngestError> {
        let outcome = self.store.commit(|state| {
            let existing: Option<&Server> = state.server(&payload.server_id);
            if existing.is_some_and(|s| s.is_inactive) {
                return (vec![], Err(IngestError::InactiveServer));
            }
            let registered = existing.is_none();

            let mut events = Vec::new();
            if registered {
                tracing::info!(
                    server_id = %payload.server_id,
                    hostname = %payload.hostname,
                    "auto-registering server from heartbeat"
                );
                events.push(Event::ServerRegistered {
                    id: payload.server_id.clone(),
                    guid: payload.server_guid.clone(),
                    hostname: Some(payload.hostname.clone()),
                    display_name: None,
                    at: now,
                });
            }

            // Category detection runs while the source is unset or auto;
            // manual assignments are never overwritten.
            let category = {
                let manual = existing
                    .is_some_and(|s| s.machine_category_source == Some(CategorySource::Manual));
                if manual {
                    None
                } else {
                    let model = payload
                        .cpu_info
                        .as_ref()
                        .and_then(|c| c.cpu_model.as_deref())
                        .or(existing.and_then(|s| s.cpu_model.as_deref()));
                    let arch = payload
                        .os_info
                        .as_ref()
                        .and_then(|o| o.architecture.as_deref())
                        .or(existing.and_then(|s| s.architecture.as_deref()));
                    let cores = payload
                        .cpu_info
                        .as_ref()
                        .and_then(|c| c.cpu_cores)
                        .or(existing.and_then(|s| s.cpu_cores));
                    detect_category(model, arch, cores).map(|c| (c, CategorySource::Auto))
                }
            };

            events.push(Event::ServerInfoUpdated {
                id: payload.server_id.clone(),
                os_info: payload.os_info.clone(),
                cpu_info: payload.cpu_info.clone(),
                agent_version: payload.agent_version.clone(),
                agent_mode: payload.agent_mode,
                reboot_required: payload.reboot_required,
                category,
            });

            events.push(Event::ServerHeartbeat {
                id: payload.server_id.clone(),
                at: now,
                metrics: payload.metrics.clone(),
                updates_available: payload.updates_available,
                security_updates: payload.security_updates,
            });

            if let Some(services) = &payload.services {
                events.push(Event::ServerServicesReported {
                    id: payload.server_id.clone(),
                    services: services.clone(),
                    at: now,
                });
            }
            if let Some(packages) = &payload.packages {
                events.push(Event::ServerPackagesReported {
                    id: payload.server_id.clone(),
                    packages: packages.clone(),
                });
            }

            (events, Ok(registered))
        })?;
        outcome
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
