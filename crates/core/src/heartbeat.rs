// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat wire payloads.
//!
//! These are the typed forms of what agents post to the hub. Validation is
//! explicit and happens before anything is persisted; unknown service
//! states are rejected at deserialization rather than silently ignored.

use crate::id::{IdError, MachineGuid, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for an incoming heartbeat.
#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error("service {name:?}: pid must be >= 0")]
    NegativePid { name: String },
    #[error("service {name:?}: cpu_percent {value} exceeds 100")]
    ServiceCpuOutOfRange { name: String, value: f64 },
    #[error("metric {metric} value {value} out of range 0..=100")]
    MetricOutOfRange { metric: &'static str, value: f64 },
}

/// Reported run state of a systemd unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRunState {
    Running,
    Stopped,
    Failed,
    Unknown,
}

impl ServiceRunState {
    /// Stopped and failed units are alertable; unknown is ignored.
    pub fn is_down(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

/// One service entry from a heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceReport {
    pub name: String,
    pub status: ServiceRunState,
    #[serde(default)]
    pub pid: Option<i64>,
    #[serde(default)]
    pub memory_mb: Option<f64>,
    #[serde(default)]
    pub cpu_percent: Option<f64>,
}

/// One pending package update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageUpdate {
    pub name: String,
    #[serde(default)]
    pub current_version: Option<String>,
    #[serde(default)]
    pub new_version: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub is_security: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesystemUsage {
    pub mount_point: String,
    pub total_gb: f64,
    pub used_gb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub tx_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsInfo {
    #[serde(default)]
    pub distribution: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub kernel: Option<String>,
    #[serde(default)]
    pub architecture: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    #[serde(default)]
    pub cpu_model: Option<String>,
    #[serde(default)]
    pub cpu_cores: Option<u32>,
}

/// The numeric sample evaluated against thresholds. All fields optional:
/// an agent may report a partial set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub memory_percent: Option<f64>,
    #[serde(default)]
    pub disk_percent: Option<f64>,
    #[serde(default)]
    pub load_1m: Option<f64>,
    #[serde(default)]
    pub load_5m: Option<f64>,
    #[serde(default)]
    pub load_15m: Option<f64>,
    #[serde(default)]
    pub uptime_seconds: Option<u64>,
}

/// A full heartbeat as posted by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub server_guid: MachineGuid,
    pub server_id: ServerId,
    pub hostname: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub agent_version: Option<String>,
    #[serde(default)]
    pub agent_mode: Option<crate::server::AgentMode>,
    #[serde(default)]
    pub os_info: Option<OsInfo>,
    #[serde(default)]
    pub cpu_info: Option<CpuInfo>,
    #[serde(default)]
    pub reboot_required: Option<bool>,
    #[serde(default)]
    pub metrics: MetricsSample,
    #[serde(default)]
    pub filesystems: Vec<FilesystemUsage>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(default)]
    pub services: Option<Vec<ServiceReport>>,
    #[serde(default)]
    pub packages: Option<Vec<PackageUpdate>>,
    #[serde(default)]
    pub updates_available: Option<u32>,
    #[serde(default)]
    pub security_updates: Option<u32>,
}

impl HeartbeatPayload {
    /// Range and shape checks beyond what serde enforces.
    pub fn validate(&self) -> Result<(), HeartbeatError> {
        for (metric, value) in [
            ("cpu_percent", self.metrics.cpu_percent),
            ("memory_percent", self.metrics.memory_percent),
            ("disk_percent", self.metrics.disk_percent),
        ] {
            if let Some(v) = value {
                if !(0.0..=100.0).contains(&v) {
                    return Err(HeartbeatError::MetricOutOfRange { metric, value: v });
                }
            }
        }
        for svc in self.services.iter().flatten() {
            if svc.pid.is_some_and(|pid| pid < 0) {
                return Err(HeartbeatError::NegativePid { name: svc.name.clone() });
            }
            if let Some(cpu) = svc.cpu_percent {
                if cpu > 100.0 {
                    return Err(HeartbeatError::ServiceCpuOutOfRange {
                        name: svc.name.clone(),
                        value: cpu,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
