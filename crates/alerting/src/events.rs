// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The notification-facing alert event.

use hlh_core::{AlertSeverity, MetricKey, ServerId};

/// One decision the evaluator made that the notifier may care about.
///
/// `severity: None` together with `is_resolved` marks a resolution;
/// otherwise the severity is the alert's current level.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub server_id: ServerId,
    pub server_name: String,
    pub metric_type: MetricKey,
    pub severity: Option<AlertSeverity>,
    pub current_value: f64,
    pub threshold_value: f64,
    pub is_reminder: bool,
    pub is_resolved: bool,
    pub duration_minutes: Option<i64>,
}

impl AlertEvent {
    pub fn raised(
        server_id: &ServerId,
        server_name: &str,
        metric_type: MetricKey,
        severity: AlertSeverity,
        current_value: f64,
        threshold_value: f64,
        is_reminder: bool,
    ) -> Self {
        Self {
            server_id: server_id.clone(),
            server_name: server_name.to_string(),
            metric_type,
            severity: Some(severity),
            current_value,
            threshold_value,
            is_reminder,
            is_resolved: false,
            duration_minutes: None,
        }
    }

    pub fn resolved(
        server_id: &ServerId,
        server_name: &str,
        metric_type: MetricKey,
        current_value: f64,
        duration_minutes: Option<i64>,
    ) -> Self {
        Self {
            server_id: server_id.clone(),
            server_name: server_name.to_string(),
            metric_type,
            severity: None,
            current_value,
            threshold_value: 0.0,
            is_reminder: false,
            is_resolved: true,
            duration_minutes,
        }
    }
}
