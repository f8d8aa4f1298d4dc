// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The threshold state machine.
//!
//! Per-metric state lives in the store's runtime `alert_states` map and is
//! only touched here (and by the delete cascade). Persistent `Alert`
//! records are written through events in the same commit that advances the
//! state machine, so a crash cannot separate the two.

use crate::events::AlertEvent;
use chrono::{DateTime, Duration, Utc};
use hlh_core::{
    Alert, AlertSeverity, AlertStatus, Clock, CooldownConfig, Event, MetricKey, MetricThreshold,
    ServiceReport, ServerId, ThresholdsConfig,
};
use hlh_storage::{HubStore, MaterializedState, StoreError};
use thiserror::Error;

/// Operator-facing alert lifecycle failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlertOpError {
    #[error("alert {0} not found")]
    NotFound(u64),
    #[error("cannot {action} alert with status {status:?}")]
    InvalidStatus { action: &'static str, status: &'static str },
}

/// Decides when to raise, escalate, re-notify and resolve alerts.
pub struct AlertingEngine<C: Clock> {
    store: HubStore,
    clock: C,
    /// Agent reporting cadence. A breached sample is taken to cover the
    /// whole interval before it: metrics are sampled, not continuous, so
    /// the first breached heartbeat already witnesses one interval of
    /// breach.
    heartbeat_interval: u32,
}

impl<C: Clock> AlertingEngine<C> {
    pub fn new(store: HubStore, clock: C, heartbeat_interval: u32) -> Self {
        Self { store, clock, heartbeat_interval }
    }

    /// Evaluate one heartbeat's metrics: per-metric thresholds, then
    /// auto-resolve, then offline recovery. Returns the events that
    /// should reach the notifier.
    pub fn evaluate_heartbeat(
        &self,
        server_id: &ServerId,
        server_name: &str,
        cpu_percent: Option<f64>,
        memory_percent: Option<f64>,
        disk_percent: Option<f64>,
        thresholds: &ThresholdsConfig,
        cooldowns: &CooldownConfig,
    ) -> Result<Vec<AlertEvent>, StoreError> {
        let now = self.clock.now();
        let interval = self.heartbeat_interval;
        self.store.commit(|state| {
            let mut events = Vec::new();
            let mut out = Vec::new();

            let metrics: [(MetricKey, Option<f64>, MetricThreshold); 3] = [
                (MetricKey::Cpu, cpu_percent, thresholds.cpu),
                (MetricKey::Memory, memory_percent, thresholds.memory),
                (MetricKey::Disk, disk_percent, thresholds.disk),
            ];

            for (metric, value, threshold) in &metrics {
                if let Some(value) = value {
                    if let Some(event) = evaluate_metric(
                        state, &mut events, server_id, server_name, metric, *value, threshold,
                        cooldowns, interval, now,
                    ) {
                        out.push(event);
                    }
                }
            }

            out.extend(check_auto_resolve(
                state, &mut events, server_id, server_name, cpu_percent, memory_percent,
                disk_percent, thresholds, now,
            ));

            if let Some(event) =
                resolve_offline(state, &mut events, server_id, server_name, now)
            {
                out.push(event);
            }

            (events, out)
        })
    }

    /// Evaluate reported services against the expected set.
    pub fn evaluate_services(
        &self,
        server_id: &ServerId,
        server_name: &str,
        services: &[ServiceReport],
        cooldowns: &CooldownConfig,
    ) -> Result<Vec<AlertEvent>, StoreError> {
        let now = self.clock.now();
        self.store.commit(|state| {
            let mut events = Vec::new();
            let mut out = Vec::new();

            let expected: Vec<(String, bool)> = state
                .expected_services_for(server_id)
                .iter()
                .filter(|s| s.enabled)
                .map(|s| (s.service_name.clone(), s.is_critical))
                .collect();
            if expected.is_empty() {
                return (events, out);
            }

            for (service_name, is_critical) in expected {
                // Not reported in this heartbeat: skip, no state change.
                let Some(report) = services.iter().find(|r| r.name == service_name) else {
                    continue;
                };
                if let Some(event) = evaluate_service(
                    state,
                    &mut events,
                    server_id,
                    server_name,
                    &service_name,
                    report.status,
                    is_critical,
                    cooldowns,
                    now,
                ) {
                    out.push(event);
                }
            }

            (events, out)
        })
    }

    /// Create or re-notify the offline alert for a server. Called by the
    /// scheduler when a server crosses the offline threshold.
    pub fn trigger_offline_alert(
        &self,
        server_id: &ServerId,
        server_name: &str,
        cooldowns: &CooldownConfig,
    ) -> Result<Option<AlertEvent>, StoreError> {
        let now = self.clock.now();
        self.store.commit(|state| {
            let mut events = Vec::new();
            let metric = MetricKey::Offline;
            let alert_state = state.alert_state_mut(server_id, &metric);

            if alert_state.current_severity.is_none() {
                alert_state.current_severity = Some(AlertSeverity::Critical);
                alert_state.consecutive_breaches = 1;
                alert_state.first_breach_at = Some(now);
                alert_state.last_notified_at = Some(now);
                alert_state.resolved_at = None;

                tracing::info!(server_id = %server_id, "server marked offline, creating alert");

                let alert = Alert {
                    id: state.allocate_alert_id(),
                    server_id: server_id.clone(),
                    alert_type: metric.alert_type().to_string(),
                    service_name: None,
                    severity: AlertSeverity::Critical,
                    status: AlertStatus::Open,
                    title: format!("Server offline: {server_name}"),
                    message: format!("Server {server_name} is not responding to heartbeats."),
                    threshold_value: 0.0,
                    actual_value: 0.0,
                    created_at: now,
                    acknowledged_at: None,
                    resolved_at: None,
                    auto_resolved: false,
                };
                events.push(Event::AlertRaised { alert });

                let event = AlertEvent::raised(
                    server_id,
                    server_name,
                    metric,
                    AlertSeverity::Critical,
                    0.0,
                    0.0,
                    false,
                );
                return (events, Some(event));
            }

            if should_notify(state.alert_state_mut(server_id, &metric), cooldowns, now) {
                let alert_state = state.alert_state_mut(server_id, &metric);
                alert_state.last_notified_at = Some(now);
                alert_state.consecutive_breaches += 1;
                let event = AlertEvent::raised(
                    server_id,
                    server_name,
                    metric,
                    AlertSeverity::Critical,
                    0.0,
                    0.0,
                    true,
                );
                return (events, Some(event));
            }

            (events, None)
        })
    }

    /// Operator acknowledgement. Idempotent when already acknowledged;
    /// refused once resolved.
    pub fn acknowledge(&self, alert_id: u64) -> Result<(), AlertOpError> {
        let now = self.clock.now();
        let outcome = self.store.commit(|state| {
            let Some(alert) = state.alert(alert_id) else {
                return (vec![], Err(AlertOpError::NotFound(alert_id)));
            };
            match alert.status {
                AlertStatus::Open => {
                    (vec![Event::AlertAcknowledged { id: alert_id, at: now }], Ok(()))
                }
                AlertStatus::Acknowledged => (vec![], Ok(())),
                AlertStatus::Resolved => (
                    vec![],
                    Err(AlertOpError::InvalidStatus { action: "acknowledge", status: "resolved" }),
                ),
            }
        });
        match outcome {
            Ok(inner) => inner,
            Err(e) => {
                tracing::error!(error = %e, "acknowledge commit failed");
                Err(AlertOpError::NotFound(alert_id))
            }
        }
    }

    /// Manual resolution from the dashboard.
    pub fn resolve(&self, alert_id: u64) -> Result<(), AlertOpError> {
        let now = self.clock.now();
        let outcome = self.store.commit(|state| {
            let Some(alert) = state.alert(alert_id) else {
                return (vec![], Err(AlertOpError::NotFound(alert_id)));
            };
            if alert.status == AlertStatus::Resolved {
                return (
                    vec![],
                    Err(AlertOpError::InvalidStatus { action: "resolve", status: "resolved" }),
                );
            }
            (vec![Event::AlertResolved { id: alert_id, at: now, auto: false }], Ok(()))
        });
        match outcome {
            Ok(inner) => inner,
            Err(e) => {
                tracing::error!(error = %e, "resolve commit failed");
                Err(AlertOpError::NotFound(alert_id))
            }
        }
    }
}

/// Cooldown check for re-notification; the tier follows the alert's
/// current severity.
fn should_notify(
    state: &hlh_core::AlertState,
    cooldowns: &CooldownConfig,
    now: DateTime<Utc>,
) -> bool {
    let Some(last) = state.last_notified_at else { return true };
    let minutes = if state.current_severity == Some(AlertSeverity::Critical) {
        cooldowns.critical_minutes
    } else {
        cooldowns.high_minutes
    };
    now - last >= Duration::minutes(i64::from(minutes))
}

#[allow(clippy::too_many_arguments)]
fn evaluate_metric(
    state: &mut MaterializedState,
    events: &mut Vec<Event>,
    server_id: &ServerId,
    server_name: &str,
    metric: &MetricKey,
    value: f64,
    threshold: &MetricThreshold,
    cooldowns: &CooldownConfig,
    heartbeat_interval: u32,
    now: DateTime<Utc>,
) -> Option<AlertEvent> {
    let (target_severity, threshold_value) = if value >= threshold.critical_percent {
        (Some(AlertSeverity::Critical), threshold.critical_percent)
    } else if value >= threshold.high_percent {
        (Some(AlertSeverity::High), threshold.high_percent)
    } else {
        (None, 0.0)
    };

    let alert_state = state.alert_state_mut(server_id, metric);

    let Some(target_severity) = target_severity else {
        // Below thresholds. Reset the breach timer only when no alert is
        // active, so auto-resolve can capture the duration first.
        if alert_state.current_severity.is_none()
            && (alert_state.first_breach_at.is_some() || alert_state.consecutive_breaches > 0)
        {
            alert_state.consecutive_breaches = 0;
            alert_state.first_breach_at = None;
            alert_state.current_value = Some(value);
            tracing::debug!(
                server_id = %server_id,
                metric = %metric,
                "metric dropped below threshold, resetting breach timer"
            );
        }
        return None;
    };

    alert_state.current_value = Some(value);

    if alert_state.consecutive_breaches == 0 {
        alert_state.consecutive_breaches = 1;
        alert_state.first_breach_at = Some(now);
    } else {
        alert_state.consecutive_breaches += 1;
    }

    // Time gate: sustained_seconds == 0 fires immediately. A sample
    // witnesses the interval preceding it, so the covered span is the
    // observed elapsed time plus one heartbeat interval.
    if threshold.sustained_seconds > 0 {
        if let Some(first) = alert_state.first_breach_at {
            let covered = (now - first).num_seconds() + i64::from(heartbeat_interval);
            if covered < i64::from(threshold.sustained_seconds) {
                tracing::debug!(
                    server_id = %server_id,
                    metric = %metric,
                    covered,
                    required = threshold.sustained_seconds,
                    "breach not yet sustained"
                );
                return None;
            }
        }
    }

    if alert_state.current_severity.is_none() {
        alert_state.current_severity = Some(target_severity);
        alert_state.last_notified_at = Some(now);

        tracing::info!(
            server_id = %server_id,
            metric = %metric,
            severity = %target_severity,
            value,
            "new alert"
        );

        let label = metric.label();
        let alert = Alert {
            id: state.allocate_alert_id(),
            server_id: server_id.clone(),
            alert_type: metric.alert_type().to_string(),
            service_name: None,
            severity: target_severity,
            status: AlertStatus::Open,
            title: format!(
                "{} {label} usage on {server_name} ({value:.0}%)",
                capitalize(target_severity.as_str())
            ),
            message: format!(
                "{label} usage on {server_name} reached {value:.1}%, exceeding the \
                 {target_severity} threshold of {threshold_value:.0}%."
            ),
            threshold_value,
            actual_value: value,
            created_at: now,
            acknowledged_at: None,
            resolved_at: None,
            auto_resolved: false,
        };
        events.push(Event::AlertRaised { alert });

        return Some(AlertEvent::raised(
            server_id,
            server_name,
            metric.clone(),
            target_severity,
            value,
            threshold_value,
            false,
        ));
    }

    // Escalation from high to critical updates the open record in place.
    if target_severity == AlertSeverity::Critical
        && state.alert_state_mut(server_id, metric).current_severity == Some(AlertSeverity::High)
    {
        let alert_state = state.alert_state_mut(server_id, metric);
        alert_state.current_severity = Some(AlertSeverity::Critical);
        alert_state.last_notified_at = Some(now);

        tracing::info!(server_id = %server_id, metric = %metric, value, "escalating to critical");

        let label = metric.label();
        match state.open_alert(server_id, metric.alert_type()) {
            Some(open) => events.push(Event::AlertEscalated {
                id: open.id,
                severity: AlertSeverity::Critical,
                threshold_value,
                actual_value: value,
                message: format!(
                    "{label} usage escalated to critical at {value:.1}%, exceeding the \
                     critical threshold of {threshold_value:.0}%."
                ),
            }),
            None => tracing::warn!(
                server_id = %server_id,
                metric = %metric,
                "no open alert found to escalate"
            ),
        }

        return Some(AlertEvent::raised(
            server_id,
            server_name,
            metric.clone(),
            AlertSeverity::Critical,
            value,
            threshold_value,
            false,
        ));
    }

    let alert_state = state.alert_state_mut(server_id, metric);
    if should_notify(alert_state, cooldowns, now) {
        alert_state.last_notified_at = Some(now);
        let severity = alert_state.current_severity.unwrap_or(target_severity);

        tracing::info!(
            server_id = %server_id,
            metric = %metric,
            value,
            "re-notifying, cooldown expired"
        );

        return Some(AlertEvent::raised(
            server_id,
            server_name,
            metric.clone(),
            severity,
            value,
            threshold_value,
            true,
        ));
    }

    None
}

#[allow(clippy::too_many_arguments)]
fn check_auto_resolve(
    state: &mut MaterializedState,
    events: &mut Vec<Event>,
    server_id: &ServerId,
    server_name: &str,
    cpu_percent: Option<f64>,
    memory_percent: Option<f64>,
    disk_percent: Option<f64>,
    thresholds: &ThresholdsConfig,
    now: DateTime<Utc>,
) -> Vec<AlertEvent> {
    let mut out = Vec::new();

    // Resolution happens below the *high* threshold, not the critical one:
    // oscillation around the critical line must not produce churn.
    let candidates: [(MetricKey, Option<f64>, f64); 3] = [
        (MetricKey::Cpu, cpu_percent, thresholds.cpu.high_percent),
        (MetricKey::Memory, memory_percent, thresholds.memory.high_percent),
        (MetricKey::Disk, disk_percent, thresholds.disk.high_percent),
    ];

    for (metric, value, high) in candidates {
        let Some(value) = value else { continue };
        if value >= high {
            continue;
        }
        let alert_state = state.alert_state_mut(server_id, &metric);
        if alert_state.current_severity.is_none() {
            continue;
        }

        let duration = alert_state.duration_minutes(now);
        alert_state.current_severity = None;
        alert_state.consecutive_breaches = 0;
        alert_state.first_breach_at = None; // only after capturing duration
        alert_state.resolved_at = Some(now);
        alert_state.current_value = Some(value);

        tracing::info!(
            server_id = %server_id,
            metric = %metric,
            value,
            duration_minutes = duration,
            "auto-resolved"
        );

        if let Some(open) = state.open_alert(server_id, metric.alert_type()) {
            events.push(Event::AlertResolved { id: open.id, at: now, auto: true });
        }

        out.push(AlertEvent::resolved(server_id, server_name, metric, value, duration));
    }

    out
}

fn resolve_offline(
    state: &mut MaterializedState,
    events: &mut Vec<Event>,
    server_id: &ServerId,
    server_name: &str,
    now: DateTime<Utc>,
) -> Option<AlertEvent> {
    let metric = MetricKey::Offline;
    let alert_state = state.alert_states.get_mut(&(server_id.clone(), metric.clone()))?;
    if alert_state.current_severity.is_none() {
        return None;
    }

    let duration = alert_state.duration_minutes(now);
    alert_state.current_severity = None;
    alert_state.consecutive_breaches = 0;
    alert_state.resolved_at = Some(now);

    tracing::info!(
        server_id = %server_id,
        duration_minutes = duration,
        "offline alert resolved by heartbeat"
    );

    if let Some(open) = state.open_alert(server_id, metric.alert_type()) {
        events.push(Event::AlertResolved { id: open.id, at: now, auto: true });
    }

    Some(AlertEvent::resolved(server_id, server_name, metric, 0.0, duration))
}

#[allow(clippy::too_many_arguments)]
fn evaluate_service(
    state: &mut MaterializedState,
    events: &mut Vec<Event>,
    server_id: &ServerId,
    server_name: &str,
    service_name: &str,
    status: hlh_core::ServiceRunState,
    is_critical: bool,
    cooldowns: &CooldownConfig,
    now: DateTime<Utc>,
) -> Option<AlertEvent> {
    let metric = MetricKey::Service(service_name.to_string());

    if status.is_down() {
        let severity = if is_critical { AlertSeverity::High } else { AlertSeverity::Medium };

        // A new record is needed when the state shows no active alert, or
        // when it does but the open record was manually resolved.
        let state_active = state.alert_state_mut(server_id, &metric).is_active();
        let needs_new =
            !state_active || state.open_service_alert(server_id, service_name).is_none();
        if needs_new && state_active {
            tracing::info!(
                server_id = %server_id,
                service = service_name,
                "state active but no open alert, creating a new one"
            );
        }

        if needs_new {
            let alert_state = state.alert_state_mut(server_id, &metric);
            alert_state.current_severity = Some(severity);
            alert_state.consecutive_breaches = 1;
            alert_state.first_breach_at = Some(now);
            alert_state.last_notified_at = Some(now);
            alert_state.resolved_at = None;

            tracing::info!(
                server_id = %server_id,
                service = service_name,
                status = status.as_str(),
                severity = %severity,
                "service alert"
            );

            let alert = Alert {
                id: state.allocate_alert_id(),
                server_id: server_id.clone(),
                alert_type: "service".to_string(),
                service_name: Some(service_name.to_string()),
                severity,
                status: AlertStatus::Open,
                title: format!(
                    "Service {service_name} is {} on {server_name}",
                    status.as_str()
                ),
                message: format!(
                    "Expected service {service_name} on {server_name} is {}.",
                    status.as_str()
                ),
                threshold_value: 0.0,
                actual_value: 0.0,
                created_at: now,
                acknowledged_at: None,
                resolved_at: None,
                auto_resolved: false,
            };
            events.push(Event::AlertRaised { alert });

            return Some(AlertEvent::raised(
                server_id, server_name, metric, severity, 0.0, 0.0, false,
            ));
        }

        let alert_state = state.alert_state_mut(server_id, &metric);
        if should_notify(alert_state, cooldowns, now) {
            alert_state.last_notified_at = Some(now);
            alert_state.consecutive_breaches += 1;
            let severity = alert_state.current_severity.unwrap_or(severity);
            return Some(AlertEvent::raised(
                server_id, server_name, metric, severity, 0.0, 0.0, true,
            ));
        }
        return None;
    }

    if status == hlh_core::ServiceRunState::Running {
        let alert_state = state.alert_state_mut(server_id, &metric);
        if alert_state.current_severity.is_none() {
            return None;
        }
        let duration = alert_state.duration_minutes(now);
        alert_state.current_severity = None;
        alert_state.consecutive_breaches = 0;
        alert_state.resolved_at = Some(now);

        tracing::info!(
            server_id = %server_id,
            service = service_name,
            duration_minutes = duration,
            "service running again, resolving alert"
        );

        if let Some(open) = state.open_service_alert(server_id, service_name) {
            events.push(Event::AlertResolved { id: open.id, at: now, auto: true });
        }

        return Some(AlertEvent::resolved(server_id, server_name, metric, 0.0, duration));
    }

    // Unknown: no alerts either way.
    None
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
