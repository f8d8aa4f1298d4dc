// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::MaterializedState;
use hlh_core::test_support::{server_id, test_time};
use hlh_core::{Alert, AlertSeverity, AlertStatus, Event};

fn alert(id: u64, alert_type: &str, service: Option<&str>) -> Alert {
    Alert {
        id,
        server_id: server_id("omv-media"),
        alert_type: alert_type.into(),
        service_name: service.map(String::from),
        severity: AlertSeverity::High,
        status: AlertStatus::Open,
        title: "High CPU usage on omv-media (90%)".into(),
        message: "CPU usage reached 90%".into(),
        threshold_value: 85.0,
        actual_value: 90.0,
        created_at: test_time(),
        acknowledged_at: None,
        resolved_at: None,
        auto_resolved: false,
    }
}

#[test]
fn raise_and_query() {
    let mut state = MaterializedState::new();
    state.apply(&Event::AlertRaised { alert: alert(1, "cpu", None) });

    assert!(state.open_alert(&server_id("omv-media"), "cpu").is_some());
    assert!(state.open_alert(&server_id("omv-media"), "disk").is_none());
    assert_eq!(state.next_alert_id, 2);
}

#[test]
fn duplicate_open_alert_is_ignored() {
    let mut state = MaterializedState::new();
    state.apply(&Event::AlertRaised { alert: alert(1, "cpu", None) });
    state.apply(&Event::AlertRaised { alert: alert(2, "cpu", None) });
    assert_eq!(state.alerts.len(), 1);
}

#[test]
fn second_alert_allowed_after_resolution() {
    let mut state = MaterializedState::new();
    state.apply(&Event::AlertRaised { alert: alert(1, "cpu", None) });
    state.apply(&Event::AlertResolved { id: 1, at: test_time(), auto: true });
    state.apply(&Event::AlertRaised { alert: alert(2, "cpu", None) });

    assert_eq!(state.alerts.len(), 2);
    assert_eq!(state.open_alert(&server_id("omv-media"), "cpu").unwrap().id, 2);
}

#[test]
fn service_alerts_dedup_by_unit() {
    let mut state = MaterializedState::new();
    state.apply(&Event::AlertRaised { alert: alert(1, "service", Some("nginx")) });
    state.apply(&Event::AlertRaised { alert: alert(2, "service", Some("docker")) });
    state.apply(&Event::AlertRaised { alert: alert(3, "service", Some("nginx")) });

    assert_eq!(state.alerts.len(), 2);
    assert!(state.open_service_alert(&server_id("omv-media"), "nginx").is_some());
    assert!(state.open_service_alert(&server_id("omv-media"), "docker").is_some());
}

#[test]
fn escalation_mutates_in_place() {
    let mut state = MaterializedState::new();
    state.apply(&Event::AlertRaised { alert: alert(1, "disk", None) });
    state.apply(&Event::AlertEscalated {
        id: 1,
        severity: AlertSeverity::Critical,
        threshold_value: 95.0,
        actual_value: 96.0,
        message: "DISK usage escalated to critical at 96.0%".into(),
    });

    let a = state.alert(1).unwrap();
    assert_eq!(a.severity, AlertSeverity::Critical);
    assert_eq!(a.actual_value, 96.0);
    assert_eq!(a.status, AlertStatus::Open);
    assert_eq!(state.alerts.len(), 1);
}

#[test]
fn resolved_alert_is_immutable() {
    let mut state = MaterializedState::new();
    state.apply(&Event::AlertRaised { alert: alert(1, "cpu", None) });
    state.apply(&Event::AlertResolved { id: 1, at: test_time(), auto: true });

    state.apply(&Event::AlertEscalated {
        id: 1,
        severity: AlertSeverity::Critical,
        threshold_value: 95.0,
        actual_value: 99.0,
        message: "should not apply".into(),
    });
    let later = test_time() + chrono::Duration::minutes(5);
    state.apply(&Event::AlertResolved { id: 1, at: later, auto: false });

    let a = state.alert(1).unwrap();
    assert_eq!(a.severity, AlertSeverity::High);
    assert_eq!(a.resolved_at, Some(test_time()));
    assert!(a.auto_resolved);
}

#[test]
fn acknowledge_only_from_open() {
    let mut state = MaterializedState::new();
    state.apply(&Event::AlertRaised { alert: alert(1, "cpu", None) });
    state.apply(&Event::AlertAcknowledged { id: 1, at: test_time() });
    assert_eq!(state.alert(1).unwrap().status, AlertStatus::Acknowledged);

    // Re-acknowledging keeps the original timestamp.
    let later = test_time() + chrono::Duration::minutes(1);
    state.apply(&Event::AlertAcknowledged { id: 1, at: later });
    assert_eq!(state.alert(1).unwrap().acknowledged_at, Some(test_time()));
}
