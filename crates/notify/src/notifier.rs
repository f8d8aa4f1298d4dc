// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Slack webhook notifier with its retry ring.
//!
//! Retry policy: 429 honours `Retry-After` and queues; 5xx and timeouts
//! queue until the third attempt, then drop with a log; any other 4xx is
//! a configuration problem and is never retried. The queue is a bounded
//! ring of 100, oldest dropped on overflow. Action notifications skip the
//! queue entirely.

use crate::adapter::{ActionEvent, Notifier, SendOutcome};
use crate::slack;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hlh_alerting::AlertEvent;
use hlh_core::{AlertSeverity, Clock, NotificationsConfig};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

const MAX_RETRIES: u32 = 3;
const MAX_QUEUE_SIZE: usize = 100;
/// Backoff schedule by attempt index.
const RETRY_DELAYS: [i64; 3] = [5, 15, 45];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level failure kinds.
#[derive(Debug, thiserror::Error)]
pub enum TransportFailure {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

/// A webhook response as the retry policy sees it.
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: u16,
    /// Parsed `Retry-After` seconds, when present.
    pub retry_after: Option<u64>,
}

/// Minimal HTTP seam so the retry policy is testable without a network.
#[async_trait]
pub trait WebhookTransport: Send + Sync + 'static {
    async fn post(&self, url: &str, payload: &Value) -> Result<WebhookResponse, TransportFailure>;
}

/// Production transport on reqwest.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post(&self, url: &str, payload: &Value) -> Result<WebhookResponse, TransportFailure> {
        let response = self.client.post(url).json(payload).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportFailure::Timeout
            } else {
                TransportFailure::Network(e.to_string())
            }
        })?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        Ok(WebhookResponse { status, retry_after })
    }
}

struct QueuedNotification {
    event: AlertEvent,
    attempt: u32,
    queued_at: DateTime<Utc>,
}

/// Slack webhook notifier.
pub struct SlackNotifier<C: Clock, T: WebhookTransport> {
    transport: T,
    clock: C,
    retry_queue: Mutex<VecDeque<QueuedNotification>>,
}

impl<C: Clock, T: WebhookTransport> SlackNotifier<C, T> {
    pub fn new(transport: T, clock: C) -> Self {
        Self { transport, clock, retry_queue: Mutex::new(VecDeque::new()) }
    }

    pub fn queue_len(&self) -> usize {
        self.retry_queue.lock().len()
    }

    fn queue_for_retry(&self, event: &AlertEvent, attempt: u32) {
        let mut queue = self.retry_queue.lock();
        if queue.len() >= MAX_QUEUE_SIZE {
            if let Some(dropped) = queue.pop_front() {
                tracing::warn!(
                    metric = %dropped.event.metric_type,
                    server_id = %dropped.event.server_id,
                    "retry queue full, dropping oldest notification"
                );
            }
        }
        queue.push_back(QueuedNotification {
            event: event.clone(),
            attempt: attempt + 1,
            queued_at: self.clock.now(),
        });
    }

    /// One delivery attempt with the queue as fallback.
    async fn send_with_retry(
        &self,
        url: &str,
        event: &AlertEvent,
        payload: &Value,
        attempt: u32,
    ) -> SendOutcome {
        match self.transport.post(url, payload).await {
            Ok(response) if response.status == 429 => {
                tracing::warn!(
                    retry_after = response.retry_after.unwrap_or(60),
                    "webhook rate limited"
                );
                self.queue_for_retry(event, attempt);
                SendOutcome::Queued
            }
            Ok(response) if (200..300).contains(&response.status) => {
                tracing::info!(
                    metric = %event.metric_type,
                    server = %event.server_name,
                    "notification sent"
                );
                SendOutcome::Sent
            }
            Ok(response) if (500..600).contains(&response.status) => {
                if attempt < MAX_RETRIES {
                    self.queue_for_retry(event, attempt);
                    SendOutcome::Queued
                } else {
                    tracing::error!(
                        status = response.status,
                        attempts = attempt,
                        "notification dropped after repeated server errors"
                    );
                    SendOutcome::Dropped
                }
            }
            Ok(response) => {
                // Other 4xx: our payload or config is wrong; retrying
                // cannot help.
                tracing::error!(status = response.status, "webhook rejected notification");
                SendOutcome::Dropped
            }
            Err(TransportFailure::Timeout) | Err(TransportFailure::Network(_)) => {
                if attempt < MAX_RETRIES {
                    tracing::warn!(attempt, "webhook unreachable, queueing for retry");
                    self.queue_for_retry(event, attempt);
                    SendOutcome::Queued
                } else {
                    tracing::error!(attempts = attempt, "notification dropped, webhook unreachable");
                    SendOutcome::Dropped
                }
            }
        }
    }

    fn should_send_alert(event: &AlertEvent, config: &NotificationsConfig) -> bool {
        if event.is_resolved {
            return config.notify_on_remediation || config.notify_on_auto_resolve;
        }
        match event.severity {
            Some(AlertSeverity::Critical) => config.notify_on_critical,
            Some(AlertSeverity::High) => config.notify_on_high,
            Some(AlertSeverity::Medium) | Some(AlertSeverity::Warning) => config.notify_on_medium,
            None => true,
        }
    }
}

#[async_trait]
impl<C: Clock, T: WebhookTransport> Notifier for SlackNotifier<C, T> {
    async fn send_alert(&self, event: &AlertEvent, config: &NotificationsConfig) -> SendOutcome {
        let Some(url) = config.slack_webhook_url.as_deref() else {
            tracing::debug!("webhook not configured, skipping notification");
            return SendOutcome::NotConfigured;
        };
        if !Self::should_send_alert(event, config) {
            tracing::debug!(metric = %event.metric_type, "notification disabled by config");
            return SendOutcome::SkippedByConfig;
        }

        let payload = slack::format_alert(event, self.clock.now());
        self.send_with_retry(url, event, &payload, 1).await
    }

    async fn send_action(&self, event: &ActionEvent, config: &NotificationsConfig) -> SendOutcome {
        let Some(url) = config.slack_webhook_url.as_deref() else {
            return SendOutcome::NotConfigured;
        };
        let enabled = if event.is_success {
            config.notify_on_action_success
        } else {
            config.notify_on_action_failure
        };
        if !enabled {
            return SendOutcome::SkippedByConfig;
        }

        // Action notifications never enter the retry queue.
        let payload = slack::format_action(event);
        match self.transport.post(url, &payload).await {
            Ok(response) if (200..300).contains(&response.status) => {
                tracing::info!(action_id = event.action_id, "action notification sent");
                SendOutcome::Sent
            }
            Ok(response) => {
                tracing::warn!(
                    status = response.status,
                    action_id = event.action_id,
                    "action notification rejected"
                );
                SendOutcome::Dropped
            }
            Err(e) => {
                tracing::warn!(error = %e, action_id = event.action_id, "action notification failed");
                SendOutcome::Dropped
            }
        }
    }

    async fn process_retry_queue(&self, config: &NotificationsConfig) -> usize {
        let Some(url) = config.slack_webhook_url.clone() else {
            return 0;
        };
        let now = self.clock.now();
        let mut processed = 0;

        loop {
            // Pop the head only once its backoff delay has elapsed.
            let item = {
                let mut queue = self.retry_queue.lock();
                let Some(head) = queue.front() else { break };
                let delay_index = (head.attempt.saturating_sub(2) as usize).min(RETRY_DELAYS.len() - 1);
                let due = head.queued_at + chrono::Duration::seconds(RETRY_DELAYS[delay_index]);
                if now < due {
                    break;
                }
                match queue.pop_front() {
                    Some(item) => item,
                    None => break,
                }
            };

            let payload = slack::format_alert(&item.event, now);
            self.send_with_retry(&url, &item.event, &payload, item.attempt).await;
            processed += 1;
        }

        processed
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::sync::Arc;

    /// Scripted transport: pops the next response per post, records
    /// payloads.
    #[derive(Clone, Default)]
    pub struct MemoryTransport {
        responses: Arc<Mutex<VecDeque<Result<WebhookResponse, TransportFailure>>>>,
        pub sent: Arc<Mutex<Vec<Value>>>,
    }

    impl MemoryTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_status(&self, status: u16) {
            self.responses
                .lock()
                .push_back(Ok(WebhookResponse { status, retry_after: None }));
        }

        pub fn push_rate_limited(&self, retry_after: u64) {
            self.responses
                .lock()
                .push_back(Ok(WebhookResponse { status: 429, retry_after: Some(retry_after) }));
        }

        pub fn push_timeout(&self) {
            self.responses.lock().push_back(Err(TransportFailure::Timeout));
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl WebhookTransport for MemoryTransport {
        async fn post(
            &self,
            _url: &str,
            payload: &Value,
        ) -> Result<WebhookResponse, TransportFailure> {
            self.sent.lock().push(payload.clone());
            // Default to success when nothing is scripted.
            self.responses
                .lock()
                .pop_front()
                .unwrap_or(Ok(WebhookResponse { status: 200, retry_after: None }))
        }
    }
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
