// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert record event handlers.

use super::MaterializedState;
use hlh_core::{Alert, AlertStatus, Event, ServerId};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::AlertRaised { alert } => {
            // One open alert per (server, alert_type, service) at a time.
            let duplicate = state.alerts.iter().any(|a| {
                a.is_open()
                    && a.server_id == alert.server_id
                    && a.alert_type == alert.alert_type
                    && a.service_name == alert.service_name
            });
            if duplicate {
                return;
            }
            state.next_alert_id = state.next_alert_id.max(alert.id + 1);
            state.alerts.push(alert.clone());
        }

        Event::AlertEscalated { id, severity, threshold_value, actual_value, message } => {
            let Some(alert) = state.alerts.iter_mut().find(|a| a.id == *id) else { return };
            // Escalation mutates the open record in place; resolved alerts
            // are immutable.
            if alert.status == AlertStatus::Resolved {
                return;
            }
            alert.severity = *severity;
            alert.threshold_value = *threshold_value;
            alert.actual_value = *actual_value;
            alert.message.clone_from(message);
        }

        Event::AlertAcknowledged { id, at } => {
            let Some(alert) = state.alerts.iter_mut().find(|a| a.id == *id) else { return };
            if alert.status == AlertStatus::Open {
                alert.status = AlertStatus::Acknowledged;
                alert.acknowledged_at = Some(*at);
            }
        }

        Event::AlertResolved { id, at, auto } => {
            let Some(alert) = state.alerts.iter_mut().find(|a| a.id == *id) else { return };
            if alert.status == AlertStatus::Resolved {
                return;
            }
            alert.status = AlertStatus::Resolved;
            alert.resolved_at = Some(*at);
            alert.auto_resolved = *auto;
        }

        _ => {}
    }
}

impl MaterializedState {
    /// Most recent open alert for a `(server, alert_type)` pair.
    /// Acknowledged alerts are not returned: they stay with the operator
    /// until resolved manually.
    pub fn open_alert(&self, server_id: &ServerId, alert_type: &str) -> Option<&Alert> {
        self.alerts
            .iter()
            .rev()
            .find(|a| a.is_open() && &a.server_id == server_id && a.alert_type == alert_type)
    }

    /// Most recent open service alert for a specific unit.
    pub fn open_service_alert(&self, server_id: &ServerId, service: &str) -> Option<&Alert> {
        self.alerts.iter().rev().find(|a| {
            a.is_open()
                && &a.server_id == server_id
                && a.alert_type == "service"
                && a.service_name.as_deref() == Some(service)
        })
    }

    pub fn alert(&self, id: u64) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == id)
    }

    pub fn open_alerts_for(&self, server_id: &ServerId) -> Vec<&Alert> {
        self.alerts.iter().filter(|a| a.is_open() && &a.server_id == server_id).collect()
    }
}

#[cfg(test)]
#[path = "alerts_tests.rs"]
mod tests;
