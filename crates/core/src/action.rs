// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remediation actions and the command whitelist.
//!
//! The hub constructs every command string itself; clients only name an
//! action type and, for service restarts, a unit name. Anything outside
//! the whitelist is refused before a record is created.

use crate::id::ServerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

const DEBIAN_FRONTEND: &str = "DEBIAN_FRONTEND=noninteractive";
const APT_OPTIONS: &str =
    r#"-q -y -o Dpkg::Options::="--force-confdef" -o Dpkg::Options::="--force-confold""#;

/// The closed set of operations the hub may run remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    RestartService,
    ClearLogs,
    AptUpdate,
    AptUpgradeAll,
    AptUpgradeSecurity,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RestartService => "restart_service",
            Self::ClearLogs => "clear_logs",
            Self::AptUpdate => "apt_update",
            Self::AptUpgradeAll => "apt_upgrade_all",
            Self::AptUpgradeSecurity => "apt_upgrade_security",
        }
    }

    /// Human label used in notifications.
    pub fn label(self) -> &'static str {
        match self {
            Self::RestartService => "Restart Service",
            Self::ClearLogs => "Clear Logs",
            Self::AptUpdate => "APT Update",
            Self::AptUpgradeAll => "APT Upgrade All",
            Self::AptUpgradeSecurity => "APT Security Upgrade",
        }
    }

    pub fn is_apt(self) -> bool {
        APT_ACTION_TYPES.contains(&self)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apt actions exclude each other: only one may be in flight per server.
pub const APT_ACTION_TYPES: &[ActionType] =
    &[ActionType::AptUpdate, ActionType::AptUpgradeAll, ActionType::AptUpgradeSecurity];

/// Lifecycle of a remediation action. Transitions are one-way; the three
/// terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Approved,
    Rejected,
    Executing,
    Completed,
    Failed,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Errors from whitelist command construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandSpecError {
    #[error("service_name is required for restart_service actions")]
    MissingServiceName,
    #[error("invalid service name {0:?}")]
    InvalidServiceName(String),
    #[error("invalid package name {0:?}")]
    InvalidPackageName(String),
    #[error(
        "apt_upgrade_security is built from the server's pending packages; \
         use build_security_upgrade_command"
    )]
    SecurityUpgradeNeedsPackages,
}

#[allow(clippy::unwrap_used)] // pattern is a compile-time constant
fn service_name_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^[a-zA-Z0-9_.@+-]+$").unwrap()
    })
}

#[allow(clippy::unwrap_used)] // pattern is a compile-time constant
fn package_name_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^[a-z0-9][a-z0-9.+-]*$").unwrap()
    })
}

pub fn is_valid_service_name(name: &str) -> bool {
    service_name_re().is_match(name)
}

pub fn is_valid_package_name(name: &str) -> bool {
    package_name_re().is_match(name)
}

/// Build the exact command for a whitelisted action type.
///
/// `apt_upgrade_security` is not handled here: its command depends on the
/// server's pending packages, see [`build_security_upgrade_command`].
pub fn build_command(
    action_type: ActionType,
    service_name: Option<&str>,
) -> Result<String, CommandSpecError> {
    match action_type {
        ActionType::RestartService => {
            let name = service_name.ok_or(CommandSpecError::MissingServiceName)?;
            if !is_valid_service_name(name) {
                return Err(CommandSpecError::InvalidServiceName(name.to_string()));
            }
            Ok(format!("systemctl restart {name}"))
        }
        ActionType::ClearLogs => Ok("journalctl --vacuum-time=7d".to_string()),
        ActionType::AptUpdate => {
            Ok(format!("{DEBIAN_FRONTEND} apt-get update -q -o APT::Sandbox::User=root"))
        }
        ActionType::AptUpgradeAll => Ok(format!(
            "{DEBIAN_FRONTEND} apt-get dist-upgrade {APT_OPTIONS} -o APT::Sandbox::User=root"
        )),
        // The security upgrade has no fixed template; refusing here keeps a
        // caller from recording a misleading no-op for a server that does
        // have pending security packages.
        ActionType::AptUpgradeSecurity => Err(CommandSpecError::SecurityUpgradeNeedsPackages),
    }
}

/// Build the security-upgrade command from the server's pending security
/// packages. An empty list yields a successful no-op; the echo is kept in
/// the action history so the run is auditable.
pub fn build_security_upgrade_command(packages: &[String]) -> Result<String, CommandSpecError> {
    if packages.is_empty() {
        return Ok("echo 'No security packages to upgrade'".to_string());
    }
    for pkg in packages {
        if !is_valid_package_name(pkg) {
            return Err(CommandSpecError::InvalidPackageName(pkg.clone()));
        }
    }
    Ok(format!(
        "{DEBIAN_FRONTEND} apt-get install {APT_OPTIONS} -o APT::Sandbox::User=root {}",
        packages.join(" ")
    ))
}

/// A single remote command request, from admission to terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub id: u64,
    pub server_id: ServerId,
    pub action_type: ActionType,
    pub service_name: Option<String>,
    /// Always the output of the whitelist constructor, never client input.
    pub command: String,
    pub alert_id: Option<u64>,
    pub status: ActionStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
