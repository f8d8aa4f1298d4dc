// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slack message formatting.
//!
//! Messages use the `attachments[].blocks` schema: a colour bar, a header,
//! a two-column field section and a context line with a suggestion.
//! Sensitive values never appear here; failure notices carry stderr only,
//! truncated to 500 characters.

use crate::adapter::ActionEvent;
use chrono::{DateTime, Utc};
use hlh_alerting::AlertEvent;
use hlh_core::{AlertSeverity, MetricKey};
use serde_json::{json, Value};

const COLOR_CRITICAL: &str = "#F87171";
const COLOR_HIGH: &str = "#FBBF24";
const COLOR_MEDIUM: &str = "#60A5FA";
const COLOR_RESOLVED: &str = "#22C55E";

const MAX_STDERR_LENGTH: usize = 500;

fn color_for(severity: Option<AlertSeverity>) -> &'static str {
    match severity {
        Some(AlertSeverity::Critical) => COLOR_CRITICAL,
        Some(AlertSeverity::High) => COLOR_HIGH,
        Some(AlertSeverity::Medium) | Some(AlertSeverity::Warning) => COLOR_MEDIUM,
        None => COLOR_RESOLVED,
    }
}

fn suggestion_for(metric: &MetricKey) -> &'static str {
    match metric {
        MetricKey::Cpu => "Identify and throttle CPU-intensive processes",
        MetricKey::Memory => "Check for memory leaks or restart high-usage services",
        MetricKey::Disk => "Check for large log files or run disk cleanup",
        MetricKey::Offline => "Check network connectivity and server power",
        MetricKey::Service(_) => "Check service logs and consider restarting the service",
        MetricKey::ConfigDrift => "Re-apply the assigned configuration pack",
    }
}

fn severity_label(severity: Option<AlertSeverity>) -> String {
    match severity {
        Some(s) => {
            let s = s.as_str();
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        }
        None => "Resolved".to_string(),
    }
}

fn header_block(text: &str) -> Value {
    json!({"type": "header", "text": {"type": "plain_text", "text": text}})
}

fn fields_block(fields: Vec<Value>) -> Value {
    json!({"type": "section", "fields": fields})
}

fn mrkdwn(label: &str, value: &str) -> Value {
    json!({"type": "mrkdwn", "text": format!("*{label}:*\n{value}")})
}

fn suggestion_block(metric: &MetricKey) -> Value {
    json!({
        "type": "context",
        "elements": [{
            "type": "mrkdwn",
            "text": format!("*Suggestion:* {}", suggestion_for(metric)),
        }],
    })
}

fn attachment(color: &str, blocks: Vec<Value>) -> Value {
    json!({"attachments": [{"color": color, "blocks": blocks}]})
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Render an alert event (raise, escalation, reminder or resolution).
pub fn format_alert(event: &AlertEvent, now: DateTime<Utc>) -> Value {
    if event.is_resolved {
        return format_resolved(event);
    }

    let prefix = if event.is_reminder { "[Reminder] " } else { "" };
    let label = severity_label(event.severity);
    let color = color_for(event.severity);
    let time = timestamp(now);

    match &event.metric_type {
        MetricKey::Service(service_name) => {
            let blocks = vec![
                header_block(&format!("{prefix}{label}: Service Alert")),
                fields_block(vec![
                    mrkdwn("Server", &event.server_name),
                    mrkdwn("Service", service_name),
                    mrkdwn("Status", "Stopped/Failed"),
                    mrkdwn("Time", &time),
                ]),
                suggestion_block(&event.metric_type),
            ];
            attachment(color, blocks)
        }
        MetricKey::Offline => {
            let blocks = vec![
                header_block(&format!("{prefix}{label}: Server Offline")),
                fields_block(vec![
                    mrkdwn("Server", &event.server_name),
                    mrkdwn("Status", "Offline"),
                    mrkdwn("Time", &time),
                ]),
                suggestion_block(&event.metric_type),
            ];
            attachment(color, blocks)
        }
        MetricKey::ConfigDrift => {
            let blocks = vec![
                header_block(&format!("{prefix}{label}: Configuration Drift")),
                fields_block(vec![
                    mrkdwn("Server", &event.server_name),
                    mrkdwn("Mismatches", &format!("{:.0}", event.current_value)),
                    mrkdwn("Time", &time),
                ]),
                suggestion_block(&event.metric_type),
            ];
            attachment(color, blocks)
        }
        metric => {
            let metric_label = metric.label();
            let severity = event.severity.map(|s| s.as_str()).unwrap_or("high");
            let blocks = vec![
                header_block(&format!("{prefix}{label}: {metric_label} Usage Alert")),
                fields_block(vec![
                    mrkdwn("Server", &event.server_name),
                    mrkdwn("Current Value", &format!("{:.0}%", event.current_value)),
                    mrkdwn(
                        "Threshold",
                        &format!("{:.0}% ({severity})", event.threshold_value),
                    ),
                    mrkdwn("Time", &time),
                ]),
                suggestion_block(&event.metric_type),
            ];
            attachment(color, blocks)
        }
    }
}

fn format_resolved(event: &AlertEvent) -> Value {
    let duration = match event.duration_minutes {
        Some(minutes) => format!("{minutes} minutes"),
        None => "Unknown".to_string(),
    };

    let blocks = match &event.metric_type {
        MetricKey::Service(service_name) => vec![
            header_block(&format!("Resolved: Service {service_name} Running")),
            fields_block(vec![
                mrkdwn("Server", &event.server_name),
                mrkdwn("Service", service_name),
                mrkdwn("Duration", &duration),
            ]),
        ],
        MetricKey::Offline => vec![
            header_block("Resolved: Server Back Online"),
            fields_block(vec![
                mrkdwn("Server", &event.server_name),
                mrkdwn("Duration", &duration),
            ]),
        ],
        metric => vec![
            header_block(&format!("Resolved: {} Usage Alert", metric.label())),
            fields_block(vec![
                mrkdwn("Server", &event.server_name),
                mrkdwn("Current Value", &format!("{:.0}%", event.current_value)),
                mrkdwn("Duration", &duration),
            ]),
        ],
    };

    attachment(COLOR_RESOLVED, blocks)
}

/// Render an action completion: compact on success, detailed on failure.
pub fn format_action(event: &ActionEvent) -> Value {
    let action_desc = match &event.service_name {
        Some(service) => format!("{}: {service}", event.action_type.label()),
        None => event.action_type.label().to_string(),
    };

    if event.is_success {
        let text = format!(
            ":white_check_mark: *Action Completed:* {action_desc} on {}",
            event.server_name
        );
        let blocks = vec![json!({"type": "section", "text": {"type": "mrkdwn", "text": text}})];
        return attachment(COLOR_RESOLVED, blocks);
    }

    let mut blocks = vec![
        header_block("Action Failed"),
        fields_block(vec![
            mrkdwn("Server", &event.server_name),
            mrkdwn("Action", &action_desc),
        ]),
    ];

    if let Some(stderr) = event.stderr.as_deref().filter(|s| !s.is_empty()) {
        let mut text: String = stderr.chars().take(MAX_STDERR_LENGTH).collect();
        if stderr.chars().count() > MAX_STDERR_LENGTH {
            text.push_str("...");
        }
        blocks.push(json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": format!("*Error:*\n```\n{text}\n```")},
        }));
    }

    blocks.push(json!({
        "type": "context",
        "elements": [{"type": "mrkdwn", "text": format!("Action #{}", event.action_id)}],
    }));

    attachment(COLOR_CRITICAL, blocks)
}

#[cfg(test)]
#[path = "slack_tests.rs"]
mod tests;
