// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::fake::MemoryTransport;
use super::*;
use crate::adapter::{ActionEvent, Notifier, SendOutcome};
use hlh_core::test_support::server_id;
use hlh_core::{ActionType, FakeClock, MetricKey};

fn notifier() -> (SlackNotifier<FakeClock, MemoryTransport>, MemoryTransport, FakeClock) {
    let transport = MemoryTransport::new();
    let clock = FakeClock::new();
    let notifier = SlackNotifier::new(transport.clone(), clock.clone());
    (notifier, transport, clock)
}

fn config() -> NotificationsConfig {
    NotificationsConfig {
        slack_webhook_url: Some("https://hooks.slack.example/T000/B000".to_string()),
        ..NotificationsConfig::default()
    }
}

fn critical_event() -> AlertEvent {
    AlertEvent::raised(
        &server_id("omv-media"),
        "omv-media",
        MetricKey::Disk,
        AlertSeverity::Critical,
        96.0,
        95.0,
        false,
    )
}

#[tokio::test]
async fn sends_when_configured() {
    let (notifier, transport, _) = notifier();
    transport.push_status(200);

    let outcome = notifier.send_alert(&critical_event(), &config()).await;
    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(transport.sent_count(), 1);
}

#[tokio::test]
async fn missing_webhook_is_not_configured() {
    let (notifier, transport, _) = notifier();
    let mut cfg = config();
    cfg.slack_webhook_url = None;

    let outcome = notifier.send_alert(&critical_event(), &cfg).await;
    assert_eq!(outcome, SendOutcome::NotConfigured);
    assert_eq!(transport.sent_count(), 0);
}

#[tokio::test]
async fn config_flags_gate_severities() {
    let (notifier, transport, _) = notifier();
    let mut cfg = config();
    cfg.notify_on_critical = false;

    let outcome = notifier.send_alert(&critical_event(), &cfg).await;
    assert_eq!(outcome, SendOutcome::SkippedByConfig);
    assert_eq!(transport.sent_count(), 0);
}

#[tokio::test]
async fn resolved_events_respect_both_resolution_flags() {
    let (notifier, _, _) = notifier();
    let resolved =
        AlertEvent::resolved(&server_id("omv-media"), "omv-media", MetricKey::Disk, 40.0, Some(5));

    let mut cfg = config();
    cfg.notify_on_remediation = false;
    cfg.notify_on_auto_resolve = false;
    assert_eq!(notifier.send_alert(&resolved, &cfg).await, SendOutcome::SkippedByConfig);

    cfg.notify_on_auto_resolve = true;
    assert_eq!(notifier.send_alert(&resolved, &cfg).await, SendOutcome::Sent);
}

#[tokio::test]
async fn rate_limit_queues_and_retries_after_delay() {
    let (notifier, transport, clock) = notifier();
    transport.push_rate_limited(30);

    let outcome = notifier.send_alert(&critical_event(), &config()).await;
    assert_eq!(outcome, SendOutcome::Queued);
    assert_eq!(notifier.queue_len(), 1);

    // Not yet due.
    assert_eq!(notifier.process_retry_queue(&config()).await, 0);
    assert_eq!(notifier.queue_len(), 1);

    clock.advance(chrono::Duration::seconds(30));
    transport.push_status(200);
    assert_eq!(notifier.process_retry_queue(&config()).await, 1);
    assert_eq!(notifier.queue_len(), 0);
    assert_eq!(transport.sent_count(), 2);
}

#[tokio::test]
async fn server_errors_retry_until_third_attempt() {
    let (notifier, transport, clock) = notifier();
    let cfg = config();

    transport.push_status(500);
    assert_eq!(notifier.send_alert(&critical_event(), &cfg).await, SendOutcome::Queued);

    clock.advance(chrono::Duration::seconds(5));
    transport.push_status(500);
    assert_eq!(notifier.process_retry_queue(&cfg).await, 1);
    assert_eq!(notifier.queue_len(), 1);

    // Third attempt fails: dropped for good.
    clock.advance(chrono::Duration::seconds(15));
    transport.push_status(500);
    assert_eq!(notifier.process_retry_queue(&cfg).await, 1);
    assert_eq!(notifier.queue_len(), 0);
}

#[tokio::test]
async fn client_errors_other_than_429_never_retry() {
    let (notifier, transport, _) = notifier();
    transport.push_status(404);

    let outcome = notifier.send_alert(&critical_event(), &config()).await;
    assert_eq!(outcome, SendOutcome::Dropped);
    assert_eq!(notifier.queue_len(), 0);
}

#[tokio::test]
async fn timeouts_queue_for_retry() {
    let (notifier, transport, _) = notifier();
    transport.push_timeout();

    let outcome = notifier.send_alert(&critical_event(), &config()).await;
    assert_eq!(outcome, SendOutcome::Queued);
    assert_eq!(notifier.queue_len(), 1);
}

#[tokio::test]
async fn queue_is_bounded_ring_dropping_oldest() {
    let (notifier, transport, _) = notifier();

    for i in 0..105 {
        transport.push_timeout();
        let event = AlertEvent::raised(
            &server_id("omv-media"),
            &format!("server-{i}"),
            MetricKey::Cpu,
            AlertSeverity::High,
            90.0,
            85.0,
            false,
        );
        notifier.send_alert(&event, &config()).await;
    }

    assert_eq!(notifier.queue_len(), 100);
}

#[tokio::test]
async fn action_notifications_do_not_use_the_queue() {
    let (notifier, transport, _) = notifier();
    transport.push_rate_limited(30);

    let event = ActionEvent {
        action_id: 7,
        server_id: server_id("omv-media"),
        server_name: "omv-media".into(),
        action_type: ActionType::ClearLogs,
        service_name: None,
        is_success: false,
        exit_code: Some(1),
        stderr: Some("journalctl failed".into()),
    };
    let outcome = notifier.send_action(&event, &config()).await;
    assert_eq!(outcome, SendOutcome::Dropped);
    assert_eq!(notifier.queue_len(), 0);
}

#[tokio::test]
async fn action_flags_gate_success_and_failure() {
    let (notifier, transport, _) = notifier();
    let mut cfg = config();
    cfg.notify_on_action_success = false;

    let event = ActionEvent {
        action_id: 7,
        server_id: server_id("omv-media"),
        server_name: "omv-media".into(),
        action_type: ActionType::AptUpdate,
        service_name: None,
        is_success: true,
        exit_code: Some(0),
        stderr: None,
    };
    assert_eq!(notifier.send_action(&event, &cfg).await, SendOutcome::SkippedByConfig);
    assert_eq!(transport.sent_count(), 0);
}
