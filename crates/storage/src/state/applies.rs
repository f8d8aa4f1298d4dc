// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config apply / compliance check event handlers.

use super::MaterializedState;
use hlh_core::{ConfigApply, ConfigApplyStatus, ConfigCheck, Event, ServerId};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::ApplyCreated { record } => {
            if state.config_applies.iter().any(|a| a.id == record.id) {
                return;
            }
            state.next_apply_id = state.next_apply_id.max(record.id + 1);
            state.config_applies.push(record.clone());
        }

        Event::ApplyStarted { id, at } => {
            let Some(apply) = apply_mut(state, *id) else { return };
            if apply.status == ConfigApplyStatus::Pending {
                apply.status = ConfigApplyStatus::Running;
                apply.started_at = Some(*at);
            }
        }

        Event::ApplyProgress { id, current_item, progress, items_completed, items_failed, results } => {
            let Some(apply) = apply_mut(state, *id) else { return };
            if apply.status.is_terminal() {
                return;
            }
            apply.current_item.clone_from(current_item);
            apply.progress = *progress;
            apply.items_completed = *items_completed;
            apply.items_failed = *items_failed;
            apply.results.clone_from(results);
        }

        Event::ApplyCompleted { id, at, results } => {
            let Some(apply) = apply_mut(state, *id) else { return };
            if apply.status.is_terminal() {
                return;
            }
            apply.status = ConfigApplyStatus::Completed;
            apply.completed_at = Some(*at);
            apply.current_item = None;
            apply.progress = 100;
            apply.results.clone_from(results);
        }

        Event::ApplyFailed { id, at, error } => {
            let Some(apply) = apply_mut(state, *id) else { return };
            if apply.status.is_terminal() {
                return;
            }
            apply.status = ConfigApplyStatus::Failed;
            apply.completed_at = Some(*at);
            apply.current_item = None;
            apply.error = Some(error.clone());
        }

        Event::CheckRecorded { record } => {
            if state.config_checks.iter().any(|c| c.id == record.id) {
                return;
            }
            state.next_check_id = state.next_check_id.max(record.id + 1);
            state.config_checks.push(record.clone());
        }

        _ => {}
    }
}

fn apply_mut(state: &mut MaterializedState, id: u64) -> Option<&mut ConfigApply> {
    state.config_applies.iter_mut().find(|a| a.id == id)
}

impl MaterializedState {
    pub fn config_apply(&self, id: u64) -> Option<&ConfigApply> {
        self.config_applies.iter().find(|a| a.id == id)
    }

    /// A pending or running apply blocks new applies on the same server.
    pub fn running_apply(&self, server_id: &ServerId) -> Option<&ConfigApply> {
        self.config_applies
            .iter()
            .find(|a| &a.server_id == server_id && !a.status.is_terminal())
    }

    /// The two most recent checks of a pack on a server, newest first.
    pub fn latest_checks(
        &self,
        server_id: &ServerId,
        pack_name: &str,
    ) -> (Option<&ConfigCheck>, Option<&ConfigCheck>) {
        let mut newest: Option<&ConfigCheck> = None;
        let mut prior: Option<&ConfigCheck> = None;
        for check in self
            .config_checks
            .iter()
            .filter(|c| &c.server_id == server_id && c.pack_name == pack_name)
        {
            prior = newest;
            newest = Some(check);
        }
        (newest, prior)
    }
}

#[cfg(test)]
#[path = "applies_tests.rs"]
mod tests;
