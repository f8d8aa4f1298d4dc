// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core domain types for the Homelab Hub control plane.
//!
//! Everything here is plain data plus validation: identifiers, the machine
//! record, heartbeat payloads, alerts, remediation actions, tokens,
//! credentials, host keys, runtime configuration, and the event vocabulary
//! the store materializes from. No I/O lives in this crate.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod action;
mod alert;
mod apply;
mod category;
mod clock;
mod config;
mod credential;
mod event;
mod heartbeat;
mod host_key;
mod id;
mod server;
mod service;
mod token;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use action::{
    build_command, build_security_upgrade_command, is_valid_package_name, is_valid_service_name,
    ActionStatus, ActionType, CommandSpecError, RemediationAction, APT_ACTION_TYPES,
};
pub use alert::{Alert, AlertSeverity, AlertState, AlertStatus, MetricKey};
pub use apply::{
    ApplyItemResult, ConfigApply, ConfigApplyStatus, ConfigCheck, Mismatch, RemoveItemResult,
};
pub use category::{detect_category, CategorySource, MachineCategory};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    ConfigError, CooldownConfig, HubConfig, MetricThreshold, NotificationsConfig, SshSettings,
    ThresholdsConfig,
};
pub use credential::{Credential, CredentialType};
pub use event::Event;
pub use heartbeat::{
    CpuInfo, FilesystemUsage, HeartbeatError, HeartbeatPayload, MetricsSample, NetworkInterface,
    OsInfo, PackageUpdate, ServiceReport, ServiceRunState,
};
pub use host_key::HostKey;
pub use id::{IdError, MachineGuid, ServerId};
pub use server::{AgentMode, Server, ServerStatus};
pub use service::{ExpectedService, PendingPackage, ServiceStatus};
pub use token::{AgentCredential, RegistrationToken, TokenMode};
