// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remediation action event handlers.
//!
//! Status transitions are one-way: once an action reaches a terminal
//! state, later events for it are ignored.

use super::MaterializedState;
use hlh_core::{ActionStatus, ActionType, Event, RemediationAction, ServerId};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::ActionCreated { record } => {
            if state.actions.iter().any(|a| a.id == record.id) {
                return;
            }
            state.next_action_id = state.next_action_id.max(record.id + 1);
            state.actions.push(record.clone());
        }

        Event::ActionApproved { id, by, at } => {
            let Some(action) = action_mut(state, *id) else { return };
            if action.status == ActionStatus::Pending {
                action.status = ActionStatus::Approved;
                action.approved_at = Some(*at);
                action.approved_by = Some(by.clone());
            }
        }

        Event::ActionRejected { id, by, reason, at } => {
            let Some(action) = action_mut(state, *id) else { return };
            if action.status == ActionStatus::Pending {
                action.status = ActionStatus::Rejected;
                action.rejected_at = Some(*at);
                action.rejected_by = Some(by.clone());
                action.rejection_reason = Some(reason.clone());
            }
        }

        Event::ActionStarted { id, at } => {
            let Some(action) = action_mut(state, *id) else { return };
            if action.status == ActionStatus::Approved {
                action.status = ActionStatus::Executing;
                action.executed_at = Some(*at);
            }
        }

        Event::ActionFinished { id, status, exit_code, stdout, stderr, at } => {
            let Some(action) = action_mut(state, *id) else { return };
            if action.status.is_terminal() || !status.is_terminal() {
                return;
            }
            action.status = *status;
            action.completed_at = Some(*at);
            action.exit_code = *exit_code;
            action.stdout.clone_from(stdout);
            action.stderr.clone_from(stderr);
        }

        Event::ActionCancelled { id, at } => {
            let Some(action) = action_mut(state, *id) else { return };
            if matches!(action.status, ActionStatus::Pending | ActionStatus::Approved) {
                action.status = ActionStatus::Failed;
                action.completed_at = Some(*at);
                action.exit_code = Some(-1);
                action.stderr = Some("Action cancelled by user".to_string());
            }
        }

        _ => {}
    }
}

fn action_mut(state: &mut MaterializedState, id: u64) -> Option<&mut RemediationAction> {
    state.actions.iter_mut().find(|a| a.id == id)
}

impl MaterializedState {
    pub fn action(&self, id: u64) -> Option<&RemediationAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// A pending restart for the same unit on the same server.
    pub fn pending_restart(&self, server_id: &ServerId, service: &str) -> Option<&RemediationAction> {
        self.actions.iter().find(|a| {
            &a.server_id == server_id
                && a.action_type == ActionType::RestartService
                && a.service_name.as_deref() == Some(service)
                && a.status == ActionStatus::Pending
        })
    }

    /// Any apt action still in flight on this server.
    pub fn in_flight_apt_action(&self, server_id: &ServerId) -> Option<&RemediationAction> {
        self.actions.iter().find(|a| {
            &a.server_id == server_id
                && a.action_type.is_apt()
                && matches!(
                    a.status,
                    ActionStatus::Pending | ActionStatus::Approved | ActionStatus::Executing
                )
        })
    }
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;
