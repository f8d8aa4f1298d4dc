// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub runtime configuration.
//!
//! Loaded once at startup (YAML file + environment) and injected into the
//! composition root; components never reach for global settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{metric}: critical_percent must be greater than high_percent")]
    ThresholdOrder { metric: &'static str },
    #[error("server_offline_seconds must be at least 30")]
    OfflineTooLow,
    #[error("cooldowns.critical_minutes must be at least 5")]
    CriticalCooldownTooLow,
    #[error("cooldowns.high_minutes must be at least 15")]
    HighCooldownTooLow,
}

/// Two-dimensional threshold for one numeric metric: level picks the
/// severity, `sustained_seconds` gates how long a breach must hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricThreshold {
    pub high_percent: f64,
    pub critical_percent: f64,
    /// 0 means fire immediately (used for disk).
    #[serde(default)]
    pub sustained_seconds: u32,
}

impl MetricThreshold {
    pub fn new(high: f64, critical: f64, sustained_seconds: u32) -> Self {
        Self { high_percent: high, critical_percent: critical, sustained_seconds }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    pub cpu: MetricThreshold,
    pub memory: MetricThreshold,
    pub disk: MetricThreshold,
    /// Seconds without a heartbeat before a server is marked offline.
    pub server_offline_seconds: u32,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            cpu: MetricThreshold::new(85.0, 95.0, 180),
            memory: MetricThreshold::new(85.0, 95.0, 180),
            disk: MetricThreshold::new(80.0, 95.0, 0),
            server_offline_seconds: 120,
        }
    }
}

/// Minimum interval between repeated notifications for the same open
/// alert, chosen by the alert's current severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownConfig {
    pub critical_minutes: u32,
    pub high_minutes: u32,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self { critical_minutes: 30, high_minutes: 120 }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub slack_webhook_url: Option<String>,
    #[serde(default = "default_true")]
    pub notify_on_critical: bool,
    #[serde(default = "default_true")]
    pub notify_on_high: bool,
    #[serde(default = "default_true")]
    pub notify_on_medium: bool,
    /// Resolution notices for manually remediated alerts.
    #[serde(default = "default_true")]
    pub notify_on_remediation: bool,
    /// Resolution notices for auto-resolved alerts.
    #[serde(default = "default_true")]
    pub notify_on_auto_resolve: bool,
    #[serde(default = "default_true")]
    pub notify_on_action_success: bool,
    #[serde(default = "default_true")]
    pub notify_on_action_failure: bool,
    #[serde(default)]
    pub cooldowns: CooldownConfig,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            slack_webhook_url: None,
            notify_on_critical: true,
            notify_on_high: true,
            notify_on_medium: true,
            notify_on_remediation: true,
            notify_on_auto_resolve: true,
            notify_on_action_success: true,
            notify_on_action_failure: true,
            cooldowns: CooldownConfig::default(),
        }
    }
}

fn default_ssh_username() -> String {
    "homelabcmd".to_string()
}

fn default_ssh_key_dir() -> PathBuf {
    PathBuf::from("/app/ssh")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshSettings {
    /// Username of last resort; per-server overrides and the global
    /// `ssh_username` credential take precedence.
    #[serde(default = "default_ssh_username")]
    pub default_username: String,
    /// On-disk fallback directory searched when no key is in the vault.
    #[serde(default = "default_ssh_key_dir")]
    pub key_dir: PathBuf,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            default_username: default_ssh_username(),
            key_dir: default_ssh_key_dir(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

fn default_heartbeat_interval() -> u32 {
    60
}

/// Top-level hub configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    /// Externally reachable base URL, embedded in generated agent configs.
    #[serde(default)]
    pub hub_url: Option<String>,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub ssh: SshSettings,
    /// Legacy shared agent key. When unset, the legacy auth header is
    /// rejected outright.
    #[serde(default)]
    pub legacy_api_key: Option<String>,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u32,
}

impl HubConfig {
    /// Startup validation. Violations are fatal; the hub refuses to run
    /// with thresholds that cannot be evaluated coherently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (metric, t) in [
            ("cpu", self.thresholds.cpu),
            ("memory", self.thresholds.memory),
            ("disk", self.thresholds.disk),
        ] {
            if t.critical_percent <= t.high_percent {
                return Err(ConfigError::ThresholdOrder { metric });
            }
        }
        if self.thresholds.server_offline_seconds < 30 {
            return Err(ConfigError::OfflineTooLow);
        }
        if self.notifications.cooldowns.critical_minutes < 5 {
            return Err(ConfigError::CriticalCooldownTooLow);
        }
        if self.notifications.cooldowns.high_minutes < 15 {
            return Err(ConfigError::HighCooldownTooLow);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
