// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Expected services, reported service statuses, and pending packages.

use crate::heartbeat::ServiceRunState;
use crate::id::ServerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A service the operator expects to be running on a server. Critical
/// services raise high-severity alerts when down, others medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedService {
    pub server_id: ServerId,
    pub service_name: String,
    pub display_name: String,
    pub is_critical: bool,
    pub enabled: bool,
}

/// Last reported status of a service on a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub status: ServiceRunState,
    pub pid: Option<i64>,
    pub memory_mb: Option<f64>,
    pub cpu_percent: Option<f64>,
    pub reported_at: DateTime<Utc>,
}

/// A package update pending on a server. Replaced wholesale on every
/// heartbeat that carries a package list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPackage {
    pub name: String,
    pub current_version: Option<String>,
    pub new_version: Option<String>,
    pub repository: Option<String>,
    pub is_security: bool,
}
