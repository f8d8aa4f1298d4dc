// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::MaterializedState;
use hlh_core::test_support::{server_id, test_time};
use hlh_core::{ApplyItemResult, ConfigApply, ConfigApplyStatus, ConfigCheck, Event, Mismatch};

fn apply_record(id: u64) -> ConfigApply {
    ConfigApply {
        id,
        server_id: server_id("omv-media"),
        pack_name: "base".into(),
        status: ConfigApplyStatus::Pending,
        progress: 0,
        items_total: 2,
        items_completed: 0,
        items_failed: 0,
        current_item: None,
        results: vec![],
        error: None,
        triggered_by: "user".into(),
        created_at: test_time(),
        started_at: None,
        completed_at: None,
    }
}

fn check(id: u64, compliant: bool) -> ConfigCheck {
    ConfigCheck {
        id,
        server_id: server_id("omv-media"),
        pack_name: "base".into(),
        is_compliant: compliant,
        mismatches: if compliant {
            vec![]
        } else {
            vec![Mismatch { kind: "missing_package".into(), item: "htop".into(), detail: None }]
        },
        checked_at: test_time(),
    }
}

#[test]
fn apply_lifecycle() {
    let mut state = MaterializedState::new();
    state.apply(&Event::ApplyCreated { record: apply_record(1) });
    state.apply(&Event::ApplyStarted { id: 1, at: test_time() });
    state.apply(&Event::ApplyProgress {
        id: 1,
        current_item: Some("~/.hello".into()),
        progress: 50,
        items_completed: 1,
        items_failed: 0,
        results: vec![ApplyItemResult {
            item: "~/.hello".into(),
            action: "created".into(),
            success: true,
            error: None,
        }],
    });
    state.apply(&Event::ApplyCompleted {
        id: 1,
        at: test_time(),
        results: vec![
            ApplyItemResult {
                item: "~/.hello".into(),
                action: "created".into(),
                success: true,
                error: None,
            },
            ApplyItemResult {
                item: "htop".into(),
                action: "installed".into(),
                success: true,
                error: None,
            },
        ],
    });

    let a = state.config_apply(1).unwrap();
    assert_eq!(a.status, ConfigApplyStatus::Completed);
    assert_eq!(a.progress, 100);
    assert!(a.current_item.is_none());
    assert_eq!(a.results.len(), 2);
}

#[test]
fn running_apply_blocks_until_terminal() {
    let mut state = MaterializedState::new();
    state.apply(&Event::ApplyCreated { record: apply_record(1) });
    assert!(state.running_apply(&server_id("omv-media")).is_some());

    state.apply(&Event::ApplyFailed { id: 1, at: test_time(), error: "ssh connection failed".into() });
    assert!(state.running_apply(&server_id("omv-media")).is_none());
    assert_eq!(state.config_apply(1).unwrap().error.as_deref(), Some("ssh connection failed"));
}

#[test]
fn terminal_apply_ignores_progress() {
    let mut state = MaterializedState::new();
    state.apply(&Event::ApplyCreated { record: apply_record(1) });
    state.apply(&Event::ApplyFailed { id: 1, at: test_time(), error: "x".into() });
    state.apply(&Event::ApplyProgress {
        id: 1,
        current_item: Some("late".into()),
        progress: 10,
        items_completed: 0,
        items_failed: 0,
        results: vec![],
    });
    let a = state.config_apply(1).unwrap();
    assert_eq!(a.status, ConfigApplyStatus::Failed);
    assert!(a.current_item.is_none());
}

#[test]
fn latest_checks_orders_newest_first() {
    let mut state = MaterializedState::new();
    state.apply(&Event::CheckRecorded { record: check(1, true) });
    let (newest, prior) = state.latest_checks(&server_id("omv-media"), "base");
    assert_eq!(newest.unwrap().id, 1);
    assert!(prior.is_none());

    state.apply(&Event::CheckRecorded { record: check(2, false) });
    let (newest, prior) = state.latest_checks(&server_id("omv-media"), "base");
    assert_eq!(newest.unwrap().id, 2);
    assert_eq!(prior.unwrap().id, 1);
    assert!(!newest.unwrap().is_compliant);
}

#[test]
fn checks_are_scoped_by_pack() {
    let mut state = MaterializedState::new();
    state.apply(&Event::CheckRecorded { record: check(1, true) });
    let (newest, _) = state.latest_checks(&server_id("omv-media"), "other-pack");
    assert!(newest.is_none());
}
