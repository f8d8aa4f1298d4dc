// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders for tests in other crates. Enabled via the `test-support`
//! feature so production builds never link them.

#![allow(clippy::unwrap_used)]

use crate::{
    AgentMode, HeartbeatPayload, MachineGuid, MetricsSample, PackageUpdate, ServerId,
    ServiceReport, ServiceRunState,
};
use chrono::{DateTime, TimeZone, Utc};

pub const TEST_GUID: &str = "a1b2c3d4-e5f6-4890-abcd-ef1234567890";

pub fn test_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 18, 10, 0, 0).single().unwrap()
}

pub fn server_id(s: &str) -> ServerId {
    ServerId::parse(s).unwrap()
}

pub fn guid(s: &str) -> MachineGuid {
    MachineGuid::parse(s).unwrap()
}

/// A heartbeat with the given metric percentages and nothing optional.
pub fn heartbeat(id: &str, cpu: f64, memory: f64, disk: f64) -> HeartbeatPayload {
    HeartbeatPayload {
        server_guid: guid(TEST_GUID),
        server_id: server_id(id),
        hostname: format!("{id}.lan"),
        timestamp: test_time(),
        agent_version: Some("1.4.0".to_string()),
        agent_mode: Some(AgentMode::Readonly),
        os_info: None,
        cpu_info: None,
        reboot_required: None,
        metrics: MetricsSample {
            cpu_percent: Some(cpu),
            memory_percent: Some(memory),
            disk_percent: Some(disk),
            ..MetricsSample::default()
        },
        filesystems: Vec::new(),
        network_interfaces: Vec::new(),
        services: None,
        packages: None,
        updates_available: None,
        security_updates: None,
    }
}

pub fn service(name: &str, status: ServiceRunState) -> ServiceReport {
    ServiceReport { name: name.to_string(), status, pid: Some(1000), memory_mb: None, cpu_percent: None }
}

pub fn security_package(name: &str) -> PackageUpdate {
    PackageUpdate {
        name: name.to_string(),
        current_version: Some("1.0".to_string()),
        new_version: Some("1.1".to_string()),
        repository: Some("focal-security".to_string()),
        is_security: true,
    }
}
