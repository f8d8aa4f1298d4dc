// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert records and the per-metric evaluation state.
//!
//! `Alert` is the persistent, operator-visible record; `AlertState` is the
//! ephemeral working memory of the threshold state machine. One `AlertState`
//! exists per `(server, metric)` pair; `current_severity == None` means no
//! active alert for that metric.

use crate::id::ServerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity attached to alerts and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    High,
    Medium,
    Warning,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Warning => "warning",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a persistent alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
}

/// What a piece of alert state is keyed on.
///
/// Serialized as the wire strings `cpu`, `memory`, `disk`, `offline`,
/// `config_drift`, and `service:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricKey {
    Cpu,
    Memory,
    Disk,
    Offline,
    ConfigDrift,
    Service(String),
}

impl MetricKey {
    /// The `alert_type` recorded on persistent alerts. Service alerts share
    /// the single type `service`; the unit name is carried separately.
    pub fn alert_type(&self) -> &str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Offline => "offline",
            Self::ConfigDrift => "config_drift",
            Self::Service(_) => "service",
        }
    }

    pub fn service_name(&self) -> Option<&str> {
        match self {
            Self::Service(name) => Some(name),
            _ => None,
        }
    }

    /// Label used in notification headers (`CPU`, `MEMORY`, ...).
    pub fn label(&self) -> String {
        match self {
            Self::Service(name) => name.clone(),
            other => other.alert_type().to_uppercase(),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(name) => write!(f, "service:{name}"),
            other => f.write_str(other.alert_type()),
        }
    }
}

impl From<String> for MetricKey {
    fn from(s: String) -> Self {
        match s.as_str() {
            "cpu" => Self::Cpu,
            "memory" => Self::Memory,
            "disk" => Self::Disk,
            "offline" => Self::Offline,
            "config_drift" => Self::ConfigDrift,
            other => match other.strip_prefix("service:") {
                Some(name) => Self::Service(name.to_string()),
                // Unrecognized keys round-trip as a service key rather than
                // being dropped; the evaluator never produces them.
                None => Self::Service(other.to_string()),
            },
        }
    }
}

impl From<MetricKey> for String {
    fn from(key: MetricKey) -> Self {
        key.to_string()
    }
}

/// Persistent, operator-visible alert record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub server_id: ServerId,
    pub alert_type: String,
    /// Set for service alerts; part of the dedup key.
    pub service_name: Option<String>,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub title: String,
    pub message: String,
    pub threshold_value: f64,
    pub actual_value: f64,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub auto_resolved: bool,
}

impl Alert {
    pub fn is_open(&self) -> bool {
        matches!(self.status, AlertStatus::Open)
    }
}

/// Ephemeral per-(server, metric) tracker for the evaluation loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertState {
    pub current_severity: Option<AlertSeverity>,
    pub consecutive_breaches: u32,
    pub first_breach_at: Option<DateTime<Utc>>,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub current_value: Option<f64>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AlertState {
    pub fn is_active(&self) -> bool {
        self.current_severity.is_some()
    }

    /// Whole minutes since the breach began. Captured at resolution time,
    /// before `first_breach_at` is cleared.
    pub fn duration_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        self.first_breach_at.map(|start| (now - start).num_minutes().max(0))
    }
}

#[cfg(test)]
#[path = "alert_tests.rs"]
mod tests;
