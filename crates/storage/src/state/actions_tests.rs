// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::MaterializedState;
use hlh_core::test_support::{server_id, test_time};
use hlh_core::{ActionStatus, ActionType, Event, RemediationAction};

fn action(id: u64, action_type: ActionType, service: Option<&str>) -> RemediationAction {
    RemediationAction {
        id,
        server_id: server_id("omv-media"),
        action_type,
        service_name: service.map(String::from),
        command: "systemctl restart nginx".into(),
        alert_id: None,
        status: ActionStatus::Pending,
        created_by: "dashboard".into(),
        created_at: test_time(),
        approved_at: None,
        approved_by: None,
        rejected_at: None,
        rejected_by: None,
        rejection_reason: None,
        executed_at: None,
        completed_at: None,
        exit_code: None,
        stdout: None,
        stderr: None,
    }
}

#[test]
fn lifecycle_pending_to_completed() {
    let mut state = MaterializedState::new();
    state.apply(&Event::ActionCreated {
        record: action(1, ActionType::RestartService, Some("nginx")),
    });
    state.apply(&Event::ActionApproved { id: 1, by: "dashboard".into(), at: test_time() });
    state.apply(&Event::ActionStarted { id: 1, at: test_time() });
    state.apply(&Event::ActionFinished {
        id: 1,
        status: ActionStatus::Completed,
        exit_code: Some(0),
        stdout: Some(String::new()),
        stderr: Some(String::new()),
        at: test_time(),
    });

    let a = state.action(1).unwrap();
    assert_eq!(a.status, ActionStatus::Completed);
    assert_eq!(a.exit_code, Some(0));
    assert_eq!(a.approved_by.as_deref(), Some("dashboard"));
}

#[test]
fn terminal_states_are_sticky() {
    let mut state = MaterializedState::new();
    state.apply(&Event::ActionCreated {
        record: action(1, ActionType::RestartService, Some("nginx")),
    });
    state.apply(&Event::ActionRejected {
        id: 1,
        by: "dashboard".into(),
        reason: "not now".into(),
        at: test_time(),
    });

    // None of these may move the action out of rejected.
    state.apply(&Event::ActionApproved { id: 1, by: "dashboard".into(), at: test_time() });
    state.apply(&Event::ActionStarted { id: 1, at: test_time() });
    state.apply(&Event::ActionFinished {
        id: 1,
        status: ActionStatus::Completed,
        exit_code: Some(0),
        stdout: None,
        stderr: None,
        at: test_time(),
    });
    state.apply(&Event::ActionCancelled { id: 1, at: test_time() });

    let a = state.action(1).unwrap();
    assert_eq!(a.status, ActionStatus::Rejected);
    assert_eq!(a.rejection_reason.as_deref(), Some("not now"));
}

#[test]
fn cancel_from_pending_or_approved() {
    let mut state = MaterializedState::new();
    state.apply(&Event::ActionCreated {
        record: action(1, ActionType::ClearLogs, None),
    });
    state.apply(&Event::ActionCancelled { id: 1, at: test_time() });

    let a = state.action(1).unwrap();
    assert_eq!(a.status, ActionStatus::Failed);
    assert_eq!(a.stderr.as_deref(), Some("Action cancelled by user"));
    assert_eq!(a.exit_code, Some(-1));
}

#[test]
fn cancel_does_not_touch_executing() {
    let mut state = MaterializedState::new();
    state.apply(&Event::ActionCreated {
        record: action(1, ActionType::ClearLogs, None),
    });
    state.apply(&Event::ActionApproved { id: 1, by: "auto".into(), at: test_time() });
    state.apply(&Event::ActionStarted { id: 1, at: test_time() });
    state.apply(&Event::ActionCancelled { id: 1, at: test_time() });
    assert_eq!(state.action(1).unwrap().status, ActionStatus::Executing);
}

#[test]
fn pending_restart_lookup() {
    let mut state = MaterializedState::new();
    state.apply(&Event::ActionCreated {
        record: action(1, ActionType::RestartService, Some("nginx")),
    });
    assert!(state.pending_restart(&server_id("omv-media"), "nginx").is_some());
    assert!(state.pending_restart(&server_id("omv-media"), "docker").is_none());

    state.apply(&Event::ActionApproved { id: 1, by: "auto".into(), at: test_time() });
    assert!(state.pending_restart(&server_id("omv-media"), "nginx").is_none());
}

#[test]
fn in_flight_apt_lookup() {
    let mut state = MaterializedState::new();
    state.apply(&Event::ActionCreated { record: action(1, ActionType::AptUpdate, None) });
    assert!(state.in_flight_apt_action(&server_id("omv-media")).is_some());

    state.apply(&Event::ActionApproved { id: 1, by: "auto".into(), at: test_time() });
    state.apply(&Event::ActionStarted { id: 1, at: test_time() });
    assert!(state.in_flight_apt_action(&server_id("omv-media")).is_some());

    state.apply(&Event::ActionFinished {
        id: 1,
        status: ActionStatus::Failed,
        exit_code: Some(100),
        stdout: None,
        stderr: Some("E: lock".into()),
        at: test_time(),
    });
    assert!(state.in_flight_apt_action(&server_id("omv-media")).is_none());
}

#[test]
fn id_counter_tracks_created_actions() {
    let mut state = MaterializedState::new();
    assert_eq!(state.allocate_action_id(), 1);
    state.apply(&Event::ActionCreated { record: action(1, ActionType::ClearLogs, None) });
    assert_eq!(state.next_action_id, 2);
    assert_eq!(state.allocate_action_id(), 2);
}
