// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hlh_core::test_support::{server_id, test_time};
use hlh_core::ActionType;

fn alert_event(metric: MetricKey, severity: AlertSeverity, reminder: bool) -> AlertEvent {
    AlertEvent::raised(&server_id("omv-media"), "Media Server", metric, severity, 92.0, 85.0, reminder)
}

fn attachment_of(value: &Value) -> &Value {
    &value["attachments"][0]
}

fn header_text(value: &Value) -> String {
    attachment_of(value)["blocks"][0]["text"]["text"].as_str().unwrap_or_default().to_string()
}

#[yare::parameterized(
    critical = { AlertSeverity::Critical, "#F87171" },
    high = { AlertSeverity::High, "#FBBF24" },
    medium = { AlertSeverity::Medium, "#60A5FA" },
    warning = { AlertSeverity::Warning, "#60A5FA" },
)]
fn colors_follow_severity(severity: AlertSeverity, color: &str) {
    let msg = format_alert(&alert_event(MetricKey::Cpu, severity, false), test_time());
    assert_eq!(attachment_of(&msg)["color"], color);
}

#[test]
fn metric_alert_has_fields_and_suggestion() {
    let msg = format_alert(&alert_event(MetricKey::Cpu, AlertSeverity::High, false), test_time());
    assert_eq!(header_text(&msg), "High: CPU Usage Alert");

    let fields = &attachment_of(&msg)["blocks"][1]["fields"];
    let rendered = serde_json::to_string(fields).unwrap();
    assert!(rendered.contains("*Server:*\\nMedia Server"));
    assert!(rendered.contains("*Current Value:*\\n92%"));
    assert!(rendered.contains("*Threshold:*\\n85% (high)"));
    assert!(rendered.contains("2026-01-18 10:00 UTC"));

    let context = serde_json::to_string(&attachment_of(&msg)["blocks"][2]).unwrap();
    assert!(context.contains("CPU-intensive"));
}

#[test]
fn reminder_prefixes_header() {
    let msg = format_alert(&alert_event(MetricKey::Disk, AlertSeverity::Critical, true), test_time());
    assert_eq!(header_text(&msg), "[Reminder] Critical: DISK Usage Alert");
}

#[test]
fn service_alert_uses_dedicated_template() {
    let msg = format_alert(
        &alert_event(MetricKey::Service("nginx".into()), AlertSeverity::High, false),
        test_time(),
    );
    assert_eq!(header_text(&msg), "High: Service Alert");
    let rendered = serde_json::to_string(&msg).unwrap();
    assert!(rendered.contains("*Service:*\\nnginx"));
    assert!(rendered.contains("Stopped/Failed"));
}

#[test]
fn offline_alert_template() {
    let msg = format_alert(
        &alert_event(MetricKey::Offline, AlertSeverity::Critical, false),
        test_time(),
    );
    assert_eq!(header_text(&msg), "Critical: Server Offline");
}

#[test]
fn resolved_message_is_green_with_duration() {
    let event = AlertEvent::resolved(&server_id("omv-media"), "Media Server", MetricKey::Cpu, 40.0, Some(23));
    let msg = format_alert(&event, test_time());
    assert_eq!(attachment_of(&msg)["color"], "#22C55E");
    assert_eq!(header_text(&msg), "Resolved: CPU Usage Alert");
    assert!(serde_json::to_string(&msg).unwrap().contains("23 minutes"));
}

#[test]
fn resolved_without_duration_says_unknown() {
    let event =
        AlertEvent::resolved(&server_id("omv-media"), "Media Server", MetricKey::Offline, 0.0, None);
    let msg = format_alert(&event, test_time());
    assert_eq!(header_text(&msg), "Resolved: Server Back Online");
    assert!(serde_json::to_string(&msg).unwrap().contains("Unknown"));
}

fn action_event(success: bool, stderr: Option<&str>) -> ActionEvent {
    ActionEvent {
        action_id: 42,
        server_id: server_id("omv-media"),
        server_name: "Media Server".into(),
        action_type: ActionType::RestartService,
        service_name: Some("nginx".into()),
        is_success: success,
        exit_code: Some(if success { 0 } else { 1 }),
        stderr: stderr.map(String::from),
    }
}

#[test]
fn action_success_is_compact() {
    let msg = format_action(&action_event(true, None));
    assert_eq!(attachment_of(&msg)["color"], "#22C55E");
    let text = attachment_of(&msg)["blocks"][0]["text"]["text"].as_str().unwrap();
    assert!(text.contains("Action Completed"));
    assert!(text.contains("Restart Service: nginx"));
    assert!(text.contains("Media Server"));
}

#[test]
fn action_failure_is_detailed_with_id() {
    let msg = format_action(&action_event(false, Some("unit not found")));
    assert_eq!(attachment_of(&msg)["color"], "#F87171");
    assert_eq!(header_text(&msg), "Action Failed");
    let rendered = serde_json::to_string(&msg).unwrap();
    assert!(rendered.contains("unit not found"));
    assert!(rendered.contains("Action #42"));
}

#[test]
fn failure_stderr_truncated_to_500_with_ellipsis() {
    let long = "e".repeat(800);
    let msg = format_action(&action_event(false, Some(&long)));
    let rendered = serde_json::to_string(&msg).unwrap();
    assert!(rendered.contains(&format!("{}...", "e".repeat(500))));
    assert!(!rendered.contains(&"e".repeat(501)));
}

#[test]
fn no_command_bodies_in_failure_messages() {
    // Only stderr appears; the command itself must never be rendered.
    let msg = format_action(&action_event(false, Some("boom")));
    let rendered = serde_json::to_string(&msg).unwrap();
    assert!(!rendered.contains("systemctl"));
}
