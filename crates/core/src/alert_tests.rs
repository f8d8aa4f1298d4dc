// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

#[yare::parameterized(
    cpu = { MetricKey::Cpu, "cpu" },
    memory = { MetricKey::Memory, "memory" },
    disk = { MetricKey::Disk, "disk" },
    offline = { MetricKey::Offline, "offline" },
    drift = { MetricKey::ConfigDrift, "config_drift" },
)]
fn metric_key_wire_strings(key: MetricKey, wire: &str) {
    assert_eq!(key.to_string(), wire);
    assert_eq!(MetricKey::from(wire.to_string()), key);
}

#[test]
fn service_key_round_trips() {
    let key = MetricKey::Service("nginx".into());
    assert_eq!(key.to_string(), "service:nginx");
    assert_eq!(MetricKey::from("service:nginx".to_string()), key);
    assert_eq!(key.alert_type(), "service");
    assert_eq!(key.service_name(), Some("nginx"));
}

#[test]
fn metric_key_serde_as_string() {
    let json = serde_json::to_string(&MetricKey::Service("docker".to_string())).unwrap();
    assert_eq!(json, "\"service:docker\"");
    let back: MetricKey = serde_json::from_str(&json).unwrap();
    assert_eq!(back, MetricKey::Service("docker".into()));
}

#[test]
fn labels() {
    assert_eq!(MetricKey::Cpu.label(), "CPU");
    assert_eq!(MetricKey::Service("nginx".into()).label(), "nginx");
}

#[test]
fn state_duration_floors_to_minutes() {
    let start = Utc.with_ymd_and_hms(2026, 1, 18, 10, 0, 0).single().unwrap();
    let state = AlertState { first_breach_at: Some(start), ..Default::default() };

    let now = start + chrono::Duration::seconds(179);
    assert_eq!(state.duration_minutes(now), Some(2));

    let now = start + chrono::Duration::seconds(180);
    assert_eq!(state.duration_minutes(now), Some(3));
}

#[test]
fn state_without_breach_has_no_duration() {
    let state = AlertState::default();
    assert_eq!(state.duration_minutes(Utc::now()), None);
    assert!(!state.is_active());
}

#[test]
fn severity_display() {
    assert_eq!(AlertSeverity::Critical.to_string(), "critical");
    assert_eq!(serde_json::to_string(&AlertSeverity::High).unwrap(), "\"high\"");
}
