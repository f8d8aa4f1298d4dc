// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The managed-machine record.
//!
//! `Server` is the aggregate root for all per-machine state; its `status`
//! is derived from heartbeat recency, never set by an operator.

use crate::category::{CategorySource, MachineCategory};
use crate::heartbeat::MetricsSample;
use crate::id::{MachineGuid, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived liveness state of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Unknown,
    Online,
    Offline,
}

/// Operating mode the agent was installed with. Only readwrite agents may
/// be targeted by remediation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    #[default]
    Readonly,
    Readwrite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub guid: MachineGuid,
    pub hostname: Option<String>,
    pub display_name: Option<String>,
    pub ip_address: Option<String>,
    pub tailscale_hostname: Option<String>,
    pub status: ServerStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,

    pub is_paused: bool,
    pub paused_at: Option<DateTime<Utc>>,
    pub is_inactive: bool,
    pub inactive_since: Option<DateTime<Utc>>,

    pub agent_mode: AgentMode,
    pub agent_version: Option<String>,

    pub os_distribution: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub architecture: Option<String>,
    pub reboot_required: Option<bool>,

    pub cpu_model: Option<String>,
    pub cpu_cores: Option<u32>,
    pub machine_category: Option<MachineCategory>,
    pub machine_category_source: Option<CategorySource>,
    pub idle_watts: Option<f64>,
    pub tdp_watts: Option<f64>,

    pub updates_available: Option<u32>,
    pub security_updates: Option<u32>,
    pub latest_metrics: Option<MetricsSample>,

    pub drift_detection_enabled: bool,
    pub assigned_packs: Vec<String>,
    /// Per-server SSH username override; falls back to the global
    /// credential, then the built-in default.
    pub ssh_username: Option<String>,
}

impl Server {
    /// A fresh record for a machine the hub has not seen before.
    pub fn new(id: ServerId, guid: MachineGuid, registered_at: DateTime<Utc>) -> Self {
        Self {
            id,
            guid,
            hostname: None,
            display_name: None,
            ip_address: None,
            tailscale_hostname: None,
            status: ServerStatus::Unknown,
            last_seen: None,
            registered_at,
            is_paused: false,
            paused_at: None,
            is_inactive: false,
            inactive_since: None,
            agent_mode: AgentMode::Readonly,
            agent_version: None,
            os_distribution: None,
            os_version: None,
            kernel_version: None,
            architecture: None,
            reboot_required: None,
            cpu_model: None,
            cpu_cores: None,
            machine_category: None,
            machine_category_source: None,
            idle_watts: None,
            tdp_watts: None,
            updates_available: None,
            security_updates: None,
            latest_metrics: None,
            drift_detection_enabled: false,
            assigned_packs: Vec::new(),
            ssh_username: None,
        }
    }

    /// Name shown in alerts and notifications.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.hostname.as_deref())
            .unwrap_or_else(|| self.id.as_str())
    }

    /// The address the SSH layer should dial: first non-empty of the
    /// tailscale hostname, IP address, and plain hostname.
    pub fn ssh_target(&self) -> Option<&str> {
        [
            self.tailscale_hostname.as_deref(),
            self.ip_address.as_deref(),
            self.hostname.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
    }

    /// Whether the offline threshold has elapsed since the last heartbeat.
    pub fn is_stale(&self, now: DateTime<Utc>, offline_seconds: u32) -> bool {
        match self.last_seen {
            Some(seen) => (now - seen).num_seconds() >= i64::from(offline_seconds),
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
