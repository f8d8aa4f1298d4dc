// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn when() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 18, 10, 0, 0).single().unwrap()
}

#[test]
fn events_serialize_with_type_tag() {
    let event = Event::ServerRegistered {
        id: ServerId::parse("omv-media").unwrap(),
        guid: MachineGuid::parse("a1b2c3d4-e5f6-4890-abcd-ef1234567890").unwrap(),
        hostname: Some("omv-media.lan".into()),
        display_name: None,
        at: when(),
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "server:registered");
    assert_eq!(value["id"], "omv-media");
}

#[test]
fn events_round_trip() {
    let event = Event::AlertEscalated {
        id: 7,
        severity: AlertSeverity::Critical,
        threshold_value: 95.0,
        actual_value: 96.0,
        message: "DISK usage escalated".into(),
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn unknown_type_tag_is_rejected() {
    let json = r#"{"type": "server:launched-into-orbit", "id": "x"}"#;
    assert!(serde_json::from_str::<Event>(json).is_err());
}

#[test]
fn name_matches_serialized_tag() {
    let events = [
        Event::ServerDeleted { id: ServerId::parse("a").unwrap() },
        Event::AlertResolved { id: 1, at: when(), auto: true },
        Event::ActionStarted { id: 1, at: when() },
        Event::ApplyFailed { id: 1, at: when(), error: "ssh".into() },
    ];
    for event in events {
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.name());
    }
}

#[test]
fn optional_fields_are_omitted() {
    let event = Event::ServerInfoUpdated {
        id: ServerId::parse("omv-media").unwrap(),
        os_info: None,
        cpu_info: None,
        agent_version: None,
        agent_mode: None,
        reboot_required: None,
        category: None,
    };
    let value = serde_json::to_value(&event).unwrap();
    assert!(value.get("os_info").is_none());
    assert!(value.get("category").is_none());
}
