// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drift detection over recorded compliance checks.
//!
//! For every server with drift detection enabled and assigned packs, the
//! two most recent checks per pack are compared. Compliant followed by
//! non-compliant raises (or updates) a `config_drift` warning alert;
//! the reverse auto-resolves it. A first-ever check never raises.

use chrono::{DateTime, Utc};
use hlh_alerting::AlertEvent;
use hlh_core::{Alert, AlertSeverity, AlertStatus, Event, MetricKey, ServerId};
use hlh_storage::{HubStore, StoreError};

/// Run one drift pass. Returns the events the notifier should see.
pub fn run_drift_detection(
    store: &HubStore,
    now: DateTime<Utc>,
) -> Result<Vec<AlertEvent>, StoreError> {
    store.commit(|state| {
        let mut events = Vec::new();
        let mut out = Vec::new();

        let eligible: Vec<(ServerId, String, Vec<String>)> = state
            .servers
            .values()
            .filter(|s| !s.is_inactive && s.drift_detection_enabled && !s.assigned_packs.is_empty())
            .map(|s| (s.id.clone(), s.name().to_string(), s.assigned_packs.clone()))
            .collect();

        for (server_id, server_name, packs) in eligible {
            for pack_name in packs {
                let (newest, prior) = state.latest_checks(&server_id, &pack_name);
                let (Some(newest), Some(prior)) = (newest, prior) else {
                    // First-ever check: no prior state to drift from.
                    continue;
                };

                if prior.is_compliant && !newest.is_compliant {
                    let mismatch_count = newest.mismatches.len();
                    let message =
                        format!("{mismatch_count} items no longer compliant with {pack_name}");

                    match state.open_alert(&server_id, "config_drift") {
                        Some(open) => {
                            events.push(Event::AlertEscalated {
                                id: open.id,
                                severity: AlertSeverity::Warning,
                                threshold_value: 0.0,
                                actual_value: mismatch_count as f64,
                                message,
                            });
                        }
                        None => {
                            tracing::warn!(
                                server_id = %server_id,
                                pack = %pack_name,
                                mismatches = mismatch_count,
                                "configuration drift detected"
                            );
                            let alert = Alert {
                                id: state.allocate_alert_id(),
                                server_id: server_id.clone(),
                                alert_type: "config_drift".to_string(),
                                service_name: None,
                                severity: AlertSeverity::Warning,
                                status: AlertStatus::Open,
                                title: format!("Configuration drift on {server_name}"),
                                message,
                                threshold_value: 0.0,
                                actual_value: mismatch_count as f64,
                                created_at: now,
                                acknowledged_at: None,
                                resolved_at: None,
                                auto_resolved: false,
                            };
                            events.push(Event::AlertRaised { alert });
                            out.push(AlertEvent::raised(
                                &server_id,
                                &server_name,
                                MetricKey::ConfigDrift,
                                AlertSeverity::Warning,
                                mismatch_count as f64,
                                0.0,
                                false,
                            ));
                        }
                    }
                } else if !prior.is_compliant && newest.is_compliant {
                    if let Some(open) = state.open_alert(&server_id, "config_drift") {
                        tracing::info!(
                            server_id = %server_id,
                            pack = %pack_name,
                            "drift resolved, machine compliant again"
                        );
                        events.push(Event::AlertResolved { id: open.id, at: now, auto: true });
                        out.push(AlertEvent::resolved(
                            &server_id,
                            &server_name,
                            MetricKey::ConfigDrift,
                            0.0,
                            None,
                        ));
                    }
                }
            }
        }

        (events, out)
    })
}

#[cfg(test)]
#[path = "drift_tests.rs"]
mod tests;
