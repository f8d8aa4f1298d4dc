// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events that drive state transitions in the hub.
//!
//! Every persistent mutation is expressed as one of these, appended to the
//! write-ahead log and applied to the materialized state. Serializes with
//! `{"type": "noun:verb", ...fields}` format.

use crate::action::{ActionStatus, RemediationAction};
use crate::alert::{Alert, AlertSeverity};
use crate::apply::{ApplyItemResult, ConfigApply, ConfigCheck};
use crate::category::{CategorySource, MachineCategory};
use crate::credential::{Credential, CredentialType};
use crate::heartbeat::{CpuInfo, MetricsSample, OsInfo, PackageUpdate, ServiceReport};
use crate::host_key::HostKey;
use crate::id::{MachineGuid, ServerId};
use crate::server::AgentMode;
use crate::service::ExpectedService;
use crate::token::{AgentCredential, RegistrationToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- servers --
    #[serde(rename = "server:registered")]
    ServerRegistered {
        id: ServerId,
        guid: MachineGuid,
        hostname: Option<String>,
        display_name: Option<String>,
        at: DateTime<Utc>,
    },

    /// OS / CPU / agent metadata reported by a heartbeat or set on claim.
    #[serde(rename = "server:info-updated")]
    ServerInfoUpdated {
        id: ServerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        os_info: Option<OsInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cpu_info: Option<CpuInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_version: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_mode: Option<AgentMode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reboot_required: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<(MachineCategory, CategorySource)>,
    },

    /// Heartbeat bookkeeping: marks the server online and records the
    /// latest metrics sample.
    #[serde(rename = "server:heartbeat")]
    ServerHeartbeat {
        id: ServerId,
        at: DateTime<Utc>,
        metrics: MetricsSample,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        updates_available: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        security_updates: Option<u32>,
    },

    #[serde(rename = "server:services-reported")]
    ServerServicesReported { id: ServerId, services: Vec<ServiceReport>, at: DateTime<Utc> },

    /// Pending packages are replaced wholesale by the reported set.
    #[serde(rename = "server:packages-reported")]
    ServerPackagesReported { id: ServerId, packages: Vec<PackageUpdate> },

    #[serde(rename = "server:marked-offline")]
    ServerMarkedOffline { id: ServerId, at: DateTime<Utc> },

    #[serde(rename = "server:paused")]
    ServerPaused { id: ServerId, paused: bool, at: DateTime<Utc> },

    #[serde(rename = "server:deactivated")]
    ServerDeactivated { id: ServerId, at: DateTime<Utc> },

    #[serde(rename = "server:reactivated")]
    ServerReactivated { id: ServerId },

    /// A reinstall binds the machine to a fresh permanent identity.
    #[serde(rename = "server:guid-rotated")]
    ServerGuidRotated { id: ServerId, guid: MachineGuid },

    /// Cascades: removes all per-server state.
    #[serde(rename = "server:deleted")]
    ServerDeleted { id: ServerId },

    #[serde(rename = "server:packs-assigned")]
    ServerPacksAssigned { id: ServerId, packs: Vec<String>, drift_detection: bool },

    #[serde(rename = "server:expected-service-added")]
    ExpectedServiceAdded { service: ExpectedService },

    // -- alerts --
    #[serde(rename = "alert:raised")]
    AlertRaised { alert: Alert },

    /// In-place severity escalation of the open alert.
    #[serde(rename = "alert:escalated")]
    AlertEscalated {
        id: u64,
        severity: AlertSeverity,
        threshold_value: f64,
        actual_value: f64,
        message: String,
    },

    #[serde(rename = "alert:acknowledged")]
    AlertAcknowledged { id: u64, at: DateTime<Utc> },

    #[serde(rename = "alert:resolved")]
    AlertResolved { id: u64, at: DateTime<Utc>, auto: bool },

    // -- tokens & credentials --
    #[serde(rename = "token:registration-minted")]
    RegistrationTokenMinted { record: RegistrationToken },

    #[serde(rename = "token:registration-claimed")]
    RegistrationTokenClaimed { id: u64, server_id: ServerId, at: DateTime<Utc> },

    #[serde(rename = "token:agent-created")]
    AgentCredentialCreated { record: AgentCredential },

    #[serde(rename = "token:agent-revoked")]
    AgentCredentialRevoked { server_guid: MachineGuid, at: DateTime<Utc> },

    #[serde(rename = "token:agent-used")]
    AgentCredentialUsed { server_guid: MachineGuid, at: DateTime<Utc> },

    #[serde(rename = "credential:stored")]
    CredentialStored { record: Credential },

    #[serde(rename = "credential:deleted")]
    CredentialDeleted { credential_type: CredentialType, server_id: Option<ServerId> },

    // -- host keys --
    #[serde(rename = "hostkey:stored")]
    HostKeyStored { record: HostKey },

    #[serde(rename = "hostkey:seen")]
    HostKeySeen { machine_id: ServerId, at: DateTime<Utc> },

    // -- actions --
    #[serde(rename = "action:created")]
    ActionCreated { record: RemediationAction },

    #[serde(rename = "action:approved")]
    ActionApproved { id: u64, by: String, at: DateTime<Utc> },

    #[serde(rename = "action:rejected")]
    ActionRejected { id: u64, by: String, reason: String, at: DateTime<Utc> },

    #[serde(rename = "action:started")]
    ActionStarted { id: u64, at: DateTime<Utc> },

    /// Terminal result of a dispatched action.
    #[serde(rename = "action:finished")]
    ActionFinished {
        id: u64,
        status: ActionStatus,
        exit_code: Option<i32>,
        stdout: Option<String>,
        stderr: Option<String>,
        at: DateTime<Utc>,
    },

    #[serde(rename = "action:cancelled")]
    ActionCancelled { id: u64, at: DateTime<Utc> },

    // -- config applies & checks --
    #[serde(rename = "apply:created")]
    ApplyCreated { record: ConfigApply },

    #[serde(rename = "apply:started")]
    ApplyStarted { id: u64, at: DateTime<Utc> },

    #[serde(rename = "apply:progress")]
    ApplyProgress {
        id: u64,
        current_item: Option<String>,
        progress: u8,
        items_completed: usize,
        items_failed: usize,
        results: Vec<ApplyItemResult>,
    },

    #[serde(rename = "apply:completed")]
    ApplyCompleted { id: u64, at: DateTime<Utc>, results: Vec<ApplyItemResult> },

    #[serde(rename = "apply:failed")]
    ApplyFailed { id: u64, at: DateTime<Utc>, error: String },

    #[serde(rename = "check:recorded")]
    CheckRecorded { record: ConfigCheck },
}

impl Event {
    /// Event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ServerRegistered { .. } => "server:registered",
            Self::ServerInfoUpdated { .. } => "server:info-updated",
            Self::ServerHeartbeat { .. } => "server:heartbeat",
            Self::ServerServicesReported { .. } => "server:services-reported",
            Self::ServerPackagesReported { .. } => "server:packages-reported",
            Self::ServerMarkedOffline { .. } => "server:marked-offline",
            Self::ServerPaused { .. } => "server:paused",
            Self::ServerDeactivated { .. } => "server:deactivated",
            Self::ServerReactivated { .. } => "server:reactivated",
            Self::ServerGuidRotated { .. } => "server:guid-rotated",
            Self::ServerDeleted { .. } => "server:deleted",
            Self::ServerPacksAssigned { .. } => "server:packs-assigned",
            Self::ExpectedServiceAdded { .. } => "server:expected-service-added",
            Self::AlertRaised { .. } => "alert:raised",
            Self::AlertEscalated { .. } => "alert:escalated",
            Self::AlertAcknowledged { .. } => "alert:acknowledged",
            Self::AlertResolved { .. } => "alert:resolved",
            Self::RegistrationTokenMinted { .. } => "token:registration-minted",
            Self::RegistrationTokenClaimed { .. } => "token:registration-claimed",
            Self::AgentCredentialCreated { .. } => "token:agent-created",
            Self::AgentCredentialRevoked { .. } => "token:agent-revoked",
            Self::AgentCredentialUsed { .. } => "token:agent-used",
            Self::CredentialStored { .. } => "credential:stored",
            Self::CredentialDeleted { .. } => "credential:deleted",
            Self::HostKeyStored { .. } => "hostkey:stored",
            Self::HostKeySeen { .. } => "hostkey:seen",
            Self::ActionCreated { .. } => "action:created",
            Self::ActionApproved { .. } => "action:approved",
            Self::ActionRejected { .. } => "action:rejected",
            Self::ActionStarted { .. } => "action:started",
            Self::ActionFinished { .. } => "action:finished",
            Self::ActionCancelled { .. } => "action:cancelled",
            Self::ApplyCreated { .. } => "apply:created",
            Self::ApplyStarted { .. } => "apply:started",
            Self::ApplyProgress { .. } => "apply:progress",
            Self::ApplyCompleted { .. } => "apply:completed",
            Self::ApplyFailed { .. } => "apply:failed",
            Self::CheckRecorded { .. } => "check:recorded",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
