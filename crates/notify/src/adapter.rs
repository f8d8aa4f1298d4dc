// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The notification seam.

use async_trait::async_trait;
use hlh_alerting::AlertEvent;
use hlh_core::{ActionType, NotificationsConfig, ServerId};

/// An action completion worth telling the operator about.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub action_id: u64,
    pub server_id: ServerId,
    pub server_name: String,
    pub action_type: ActionType,
    pub service_name: Option<String>,
    pub is_success: bool,
    pub exit_code: Option<i32>,
    pub stderr: Option<String>,
}

/// What happened to a notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Disabled by a `notify_on_*` flag: intentional success.
    SkippedByConfig,
    /// No webhook URL configured.
    NotConfigured,
    /// Parked in the retry queue.
    Queued,
    /// Gave up; logged and discarded.
    Dropped,
}

/// Adapter for sending notifications.
///
/// Implementations must never block the caller on remote failures.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send_alert(&self, event: &AlertEvent, config: &NotificationsConfig) -> SendOutcome;

    async fn send_action(&self, event: &ActionEvent, config: &NotificationsConfig) -> SendOutcome;

    /// Drain due entries from the retry queue; returns how many were
    /// attempted.
    async fn process_retry_queue(&self, config: &NotificationsConfig) -> usize;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recording notifier for tests.
    #[derive(Clone, Default)]
    pub struct FakeNotifier {
        pub alerts: Arc<Mutex<Vec<AlertEvent>>>,
        pub actions: Arc<Mutex<Vec<ActionEvent>>>,
    }

    impl FakeNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn alert_count(&self) -> usize {
            self.alerts.lock().len()
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn send_alert(
            &self,
            event: &AlertEvent,
            _config: &NotificationsConfig,
        ) -> SendOutcome {
            self.alerts.lock().push(event.clone());
            SendOutcome::Sent
        }

        async fn send_action(
            &self,
            event: &ActionEvent,
            _config: &NotificationsConfig,
        ) -> SendOutcome {
            self.actions.lock().push(event.clone());
            SendOutcome::Sent
        }

        async fn process_retry_queue(&self, _config: &NotificationsConfig) -> usize {
            0
        }
    }
}
