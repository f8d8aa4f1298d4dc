// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state built from WAL replay

mod actions;
mod alerts;
mod applies;
mod identity;
mod servers;

use hlh_core::{
    AgentCredential, Alert, AlertState, ConfigApply, ConfigCheck, Credential, Event,
    ExpectedService, HostKey, MetricKey, PendingPackage, RegistrationToken, RemediationAction,
    Server, ServerId, ServiceStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Materialized state built by replaying events.
///
/// Persistent collections change only through [`MaterializedState::apply`].
/// `alert_states` is runtime-only working memory for the threshold state
/// machine: it is mutated directly by the alerting engine under the store
/// lock and repopulates naturally after a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub servers: HashMap<ServerId, Server>,
    pub alerts: Vec<Alert>,
    pub actions: Vec<RemediationAction>,
    pub registration_tokens: Vec<RegistrationToken>,
    pub agent_credentials: Vec<AgentCredential>,
    pub credentials: Vec<Credential>,
    pub host_keys: HashMap<ServerId, HostKey>,
    #[serde(default)]
    pub expected_services: HashMap<ServerId, Vec<ExpectedService>>,
    #[serde(default)]
    pub service_statuses: HashMap<ServerId, Vec<ServiceStatus>>,
    #[serde(default)]
    pub pending_packages: HashMap<ServerId, Vec<PendingPackage>>,
    #[serde(default)]
    pub config_applies: Vec<ConfigApply>,
    #[serde(default)]
    pub config_checks: Vec<ConfigCheck>,

    // id counters, bumped by apply when records are inserted
    #[serde(default = "one")]
    pub next_alert_id: u64,
    #[serde(default = "one")]
    pub next_action_id: u64,
    #[serde(default = "one")]
    pub next_token_id: u64,
    #[serde(default = "one")]
    pub next_apply_id: u64,
    #[serde(default = "one")]
    pub next_check_id: u64,

    /// Ephemeral per-(server, metric) evaluation state. Not persisted.
    #[serde(skip)]
    pub alert_states: HashMap<(ServerId, MetricKey), AlertState>,
}

fn one() -> u64 {
    1
}

impl Default for MaterializedState {
    fn default() -> Self {
        Self {
            servers: HashMap::new(),
            alerts: Vec::new(),
            actions: Vec::new(),
            registration_tokens: Vec::new(),
            agent_credentials: Vec::new(),
            credentials: Vec::new(),
            host_keys: HashMap::new(),
            expected_services: HashMap::new(),
            service_statuses: HashMap::new(),
            pending_packages: HashMap::new(),
            config_applies: Vec::new(),
            config_checks: Vec::new(),
            next_alert_id: 1,
            next_action_id: 1,
            next_token_id: 1,
            next_apply_id: 1,
            next_check_id: 1,
            alert_states: HashMap::new(),
        }
    }
}

impl MaterializedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Unknown combinations are ignored by each family so
    /// replay of an older log stays tolerant.
    pub fn apply(&mut self, event: &Event) {
        servers::apply(self, event);
        alerts::apply(self, event);
        actions::apply(self, event);
        identity::apply(self, event);
        applies::apply(self, event);
    }

    pub fn server(&self, id: &ServerId) -> Option<&Server> {
        self.servers.get(id)
    }

    pub fn server_by_guid(&self, guid: &str) -> Option<&Server> {
        self.servers.values().find(|s| s.guid.as_str() == guid)
    }

    /// Mutable access to the evaluation state for one metric, creating it
    /// on first use.
    pub fn alert_state_mut(&mut self, server: &ServerId, metric: &MetricKey) -> &mut AlertState {
        self.alert_states.entry((server.clone(), metric.clone())).or_default()
    }

    // Id allocation for records created inside a commit closure. The
    // event apply path re-derives the counters with max(), so replay and
    // allocation agree.

    pub fn allocate_alert_id(&mut self) -> u64 {
        let id = self.next_alert_id;
        self.next_alert_id += 1;
        id
    }

    pub fn allocate_action_id(&mut self) -> u64 {
        let id = self.next_action_id;
        self.next_action_id += 1;
        id
    }

    pub fn allocate_token_id(&mut self) -> u64 {
        let id = self.next_token_id;
        self.next_token_id += 1;
        id
    }

    pub fn allocate_apply_id(&mut self) -> u64 {
        let id = self.next_apply_id;
        self.next_apply_id += 1;
        id
    }

    pub fn allocate_check_id(&mut self) -> u64 {
        let id = self.next_check_id;
        self.next_check_id += 1;
        id
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
