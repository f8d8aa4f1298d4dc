// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative periodic loop.
//!
//! Each tick marks stale agents offline and drives their alerts, drains
//! the notifier retry queue, and on a daily cadence runs compliance
//! checks plus drift detection, checkpoints the store, and fires the
//! cost-rollover hook.

use chrono::{DateTime, Utc};
use hlh_alerting::AlertingEngine;
use hlh_core::{Clock, Event, HubConfig, ServerId};
use hlh_notify::Notifier;
use hlh_packs::{run_drift_detection, ConfigApplyEngine};
use hlh_ssh::SshConnector;
use hlh_storage::HubStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Suggested tick period.
pub const TICK_PERIOD: Duration = Duration::from_secs(30);
const DAILY_SECS: i64 = 24 * 60 * 60;

/// Hook invoked once per day for cost snapshots. The cost arithmetic
/// itself lives outside the control plane.
pub trait RolloverHook: Send + Sync + 'static {
    fn on_rollover(&self, now: DateTime<Utc>);
}

/// Default hook: nothing to capture.
pub struct NoopRollover;

impl RolloverHook for NoopRollover {
    fn on_rollover(&self, _now: DateTime<Utc>) {}
}

pub struct Scheduler<C: Clock, Conn: SshConnector> {
    store: HubStore,
    alerting: Arc<AlertingEngine<C>>,
    notifier: Arc<dyn Notifier>,
    packs: Arc<ConfigApplyEngine<C, Conn>>,
    rollover: Arc<dyn RolloverHook>,
    config: HubConfig,
    clock: C,
    last_daily_run: Mutex<Option<DateTime<Utc>>>,
}

impl<C: Clock, Conn: SshConnector> Scheduler<C, Conn> {
    pub fn new(
        store: HubStore,
        alerting: Arc<AlertingEngine<C>>,
        notifier: Arc<dyn Notifier>,
        packs: Arc<ConfigApplyEngine<C, Conn>>,
        rollover: Arc<dyn RolloverHook>,
        config: HubConfig,
        clock: C,
    ) -> Self {
        Self {
            store,
            alerting,
            notifier,
            packs,
            rollover,
            config,
            clock,
            last_daily_run: Mutex::new(None),
        }
    }

    /// Run the loop until the task is aborted.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(TICK_PERIOD);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// One pass of every periodic duty.
    pub async fn tick(&self) {
        self.detect_offline().await;
        let retried = self.notifier.process_retry_queue(&self.config.notifications).await;
        if retried > 0 {
            tracing::debug!(retried, "processed notifier retry queue");
        }
        if self.daily_due() {
            self.run_daily().await;
        }
    }

    async fn detect_offline(&self) {
        let now = self.clock.now();
        let offline_seconds = self.config.thresholds.server_offline_seconds;
        let stale: Vec<ServerId> =
            self.store.read(|s| s.stale_servers(now, offline_seconds));

        for server_id in stale {
            let name = self.store.read(|s| {
                s.server(&server_id).map(|srv| srv.name().to_string()).unwrap_or_default()
            });
            tracing::warn!(server_id = %server_id, "server missed its heartbeat window");
            if let Err(e) = self.store.commit(|_| {
                (vec![Event::ServerMarkedOffline { id: server_id.clone(), at: now }], ())
            }) {
                tracing::error!(server_id = %server_id, error = %e, "failed to mark offline");
                continue;
            }
            match self.alerting.trigger_offline_alert(
                &server_id,
                &name,
                &self.config.notifications.cooldowns,
            ) {
                Ok(Some(event)) => {
                    self.notifier.send_alert(&event, &self.config.notifications).await;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(server_id = %server_id, error = %e, "offline alert failed")
                }
            }
        }
    }

    fn daily_due(&self) -> bool {
        let now = self.clock.now();
        let mut last = self.last_daily_run.lock();
        match *last {
            Some(at) if (now - at).num_seconds() < DAILY_SECS => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    async fn run_daily(&self) {
        let now = self.clock.now();
        tracing::info!("running daily maintenance pass");

        // Fresh compliance checks feed drift detection.
        let targets: Vec<(ServerId, Vec<String>)> = self.store.read(|s| {
            s.servers
                .values()
                .filter(|srv| {
                    !srv.is_inactive
                        && srv.drift_detection_enabled
                        && !srv.assigned_packs.is_empty()
                })
                .map(|srv| (srv.id.clone(), srv.assigned_packs.clone()))
                .collect()
        });
        for (server_id, packs) in targets {
            for pack in packs {
                if let Err(e) = self.packs.check_compliance(&server_id, &pack).await {
                    tracing::warn!(
                        server_id = %server_id,
                        pack = %pack,
                        error = %e,
                        "compliance check failed"
                    );
                }
            }
        }

        match run_drift_detection(&self.store, now) {
            Ok(events) => {
                for event in &events {
                    self.notifier.send_alert(event, &self.config.notifications).await;
                }
            }
            Err(e) => tracing::error!(error = %e, "drift detection failed"),
        }

        if let Err(e) = self.store.checkpoint(now) {
            tracing::error!(error = %e, "store checkpoint failed");
        }

        self.rollover.on_rollover(now);
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
