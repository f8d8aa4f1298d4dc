// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios against the composition root.
//!
//! Everything runs on fakes: a scripted SSH connector, a recording
//! notifier backed by an in-memory webhook transport, and a controllable
//! clock. The store is real (WAL + snapshots in a temp dir).

use hlh_core::test_support::{heartbeat, server_id};
use hlh_core::{
    ActionStatus, ActionType, AgentMode, AlertSeverity, AlertStatus, Clock, CredentialType, Event,
    FakeClock, HubConfig, MetricKey, MetricThreshold, ServerStatus, TokenMode,
};
use hlh_engine::{ActionRequest, AgentAuth, HubRuntime, NoopRollover};
use hlh_notify::{MemoryTransport, Notifier, SendOutcome, SlackNotifier};
use hlh_ssh::{FakeConnector, FakeHost, SshError};
use hlh_storage::HubStore;
use std::fs;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

struct Hub {
    runtime: HubRuntime<FakeClock, FakeConnector>,
    connector: FakeConnector,
    transport: MemoryTransport,
    clock: FakeClock,
    _dir: TempDir,
}

fn hub() -> Hub {
    let dir = tempdir().unwrap();
    let store = HubStore::open(&dir.path().join("state")).unwrap();

    let pack_dir = dir.path().join("packs");
    fs::create_dir_all(pack_dir.join("templates")).unwrap();
    fs::write(
        pack_dir.join("minimal.yaml"),
        "name: minimal\nitems:\n  files:\n    - path: ~/.hello\n      mode: \"0644\"\n      template: hello\n",
    )
    .unwrap();
    fs::write(pack_dir.join("templates/hello"), "hi").unwrap();

    let clock = FakeClock::new();
    let connector = FakeConnector::new();
    let transport = MemoryTransport::new();
    let notifier = Arc::new(SlackNotifier::new(transport.clone(), clock.clone()));

    let mut config = HubConfig::default();
    config.hub_url = Some("http://hub:8080".to_string());
    config.legacy_api_key = Some("legacy-shared-key".to_string());
    config.thresholds.cpu = MetricThreshold::new(85.0, 95.0, 180);
    config.thresholds.memory = MetricThreshold::new(85.0, 95.0, 180);
    config.thresholds.disk = MetricThreshold::new(80.0, 95.0, 0);
    config.notifications.slack_webhook_url =
        Some("https://hooks.slack.example/T000/B000".to_string());
    config.ssh.key_dir = dir.path().join("no-keys");

    let key = hlh_identity::CredentialVault::<FakeClock>::generate_key();
    let runtime = HubRuntime::new(
        store,
        config,
        &key,
        &pack_dir,
        connector.clone(),
        notifier,
        Arc::new(NoopRollover),
        clock.clone(),
    )
    .unwrap();

    runtime.vault.store(CredentialType::SshPrivateKey, "-----BEGIN KEY-----", None).unwrap();

    Hub { runtime, connector, transport, clock, _dir: dir }
}

impl Hub {
    async fn beat(&self, cpu: f64, memory: f64, disk: f64) {
        let payload = heartbeat("omv-media", cpu, memory, disk);
        self.runtime
            .heartbeats
            .ingest(AgentAuth::LegacyKey("legacy-shared-key"), &payload)
            .await
            .unwrap();
    }

    fn register_readwrite(&self, id: &str) {
        self.runtime
            .store
            .commit(|_| {
                (
                    vec![
                        Event::ServerRegistered {
                            id: server_id(id),
                            guid: hlh_core::MachineGuid::generate(),
                            hostname: Some(format!("{id}.lan")),
                            display_name: None,
                            at: self.clock.now(),
                        },
                        Event::ServerInfoUpdated {
                            id: server_id(id),
                            os_info: None,
                            cpu_info: None,
                            agent_version: None,
                            agent_mode: Some(AgentMode::Readwrite),
                            reboot_required: None,
                            category: None,
                        },
                    ],
                    (),
                )
            })
            .unwrap();
        self.connector.add_host(&format!("{id}.lan"), FakeHost::new("SHA256:AAA"));
    }

    fn open_alerts(&self, alert_type: &str) -> Vec<hlh_core::Alert> {
        self.runtime.store.read(|s| {
            s.alerts
                .iter()
                .filter(|a| a.is_open() && a.alert_type == alert_type)
                .cloned()
                .collect()
        })
    }
}

// S1 — a cold heartbeat auto-registers the server and brings it online.
#[tokio::test]
async fn s1_cold_heartbeat_auto_registers() {
    let hub = hub();
    let payload = heartbeat("omv-media", 10.0, 20.0, 30.0);

    let response = hub
        .runtime
        .heartbeats
        .ingest(AgentAuth::LegacyKey("legacy-shared-key"), &payload)
        .await
        .unwrap();

    assert_eq!(response.status, "ok");
    assert!(response.server_registered);
    assert!(response.pending_commands.is_empty());

    hub.runtime.store.read(|s| {
        let server = s.server(&server_id("omv-media")).unwrap();
        assert_eq!(server.status, ServerStatus::Online);
        assert!(server.last_seen.is_some());
        assert!(server.machine_category.is_none());
        assert!(server.machine_category_source.is_none());
    });
}

// S2 — CPU at 90% must be sustained for 180s before the high alert fires.
#[tokio::test]
async fn s2_sustained_cpu_alert() {
    let hub = hub();

    hub.beat(90.0, 50.0, 50.0).await;
    assert!(hub.open_alerts("cpu").is_empty());

    hub.clock.advance_secs(60);
    hub.beat(90.0, 50.0, 50.0).await;
    assert!(hub.open_alerts("cpu").is_empty());

    hub.clock.advance_secs(60);
    hub.beat(90.0, 50.0, 50.0).await;

    let alerts = hub.open_alerts("cpu");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::High);
    assert_eq!(alerts[0].actual_value, 90.0);
    assert_eq!(alerts[0].threshold_value, 85.0);
    assert_eq!(alerts[0].status, AlertStatus::Open);
}

// S3 — disk escalation mutates the open alert in place.
#[tokio::test]
async fn s3_disk_escalation_in_place() {
    let hub = hub();

    hub.beat(10.0, 10.0, 82.0).await;
    let first = hub.open_alerts("disk");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].severity, AlertSeverity::High);
    let id = first[0].id;

    hub.clock.advance_secs(60);
    hub.beat(10.0, 10.0, 96.0).await;

    let open = hub.open_alerts("disk");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, id);
    assert_eq!(open[0].severity, AlertSeverity::Critical);
    assert_eq!(open[0].actual_value, 96.0);
    assert_eq!(open[0].threshold_value, 95.0);
}

// S4 — readonly agents refuse remediation actions.
#[tokio::test]
async fn s4_readonly_refuses_actions() {
    let hub = hub();
    hub.beat(10.0, 10.0, 10.0).await; // auto-registers as readonly

    let err = hub
        .runtime
        .actions
        .create_action(&ActionRequest {
            server_id: server_id("omv-media"),
            action_type: ActionType::RestartService,
            service_name: Some("nginx".to_string()),
            alert_id: None,
        })
        .unwrap_err();

    assert_eq!(err.code(), "CONFLICT");
    assert!(err.to_string().contains("readonly"));
}

// S5 — paused servers queue actions; approval dispatches exactly once.
#[tokio::test]
async fn s5_paused_server_approval_flow() {
    let hub = hub();
    hub.register_readwrite("omv-media");
    hub.runtime
        .store
        .commit(|_| {
            (
                vec![Event::ServerPaused {
                    id: server_id("omv-media"),
                    paused: true,
                    at: hub.clock.now(),
                }],
                (),
            )
        })
        .unwrap();

    let action = hub
        .runtime
        .actions
        .create_action(&ActionRequest {
            server_id: server_id("omv-media"),
            action_type: ActionType::RestartService,
            service_name: Some("nginx".to_string()),
            alert_id: None,
        })
        .unwrap();
    assert_eq!(action.status, ActionStatus::Pending);
    assert!(action.approved_by.is_none());

    let approved = hub.runtime.actions.approve(action.id).unwrap();
    assert_eq!(approved.status, ActionStatus::Approved);

    hub.runtime.actions.execute_action(action.id).await;

    assert_eq!(
        hub.connector.commands_on("omv-media.lan"),
        vec!["systemctl restart nginx"]
    );
    let record = hub.runtime.store.read(|s| s.action(action.id).cloned()).unwrap();
    assert_eq!(record.status, ActionStatus::Completed);
    assert_eq!(record.exit_code, Some(0));
}

// S6 — a changed host key halts execution before any command runs.
#[tokio::test]
async fn s6_host_key_change_halts_execution() {
    let hub = hub();
    hub.register_readwrite("omv-media");

    let server = hub.runtime.store.read(|s| s.server(&server_id("omv-media")).cloned()).unwrap();
    hub.runtime.executor.execute(&server, "uptime", None).await.unwrap();
    assert_eq!(
        hub.runtime.host_keys.get(&server_id("omv-media")).unwrap().fingerprint,
        "SHA256:AAA"
    );

    hub.runtime.executor.clear_pool().await;
    hub.connector.set_fingerprint("omv-media.lan", "SHA256:BBB");

    let before = hub.connector.commands_on("omv-media.lan").len();
    let err = hub.runtime.executor.execute(&server, "uptime", None).await.unwrap_err();
    match err {
        SshError::HostKeyChanged { stored, presented, .. } => {
            assert_eq!(stored, "SHA256:AAA");
            assert_eq!(presented, "SHA256:BBB");
        }
        other => panic!("expected HostKeyChanged, got {other:?}"),
    }
    assert_eq!(hub.connector.commands_on("omv-media.lan").len(), before);
}

// S7 — a 429 queues the notification; the retry drains the queue.
#[tokio::test]
async fn s7_notifier_retry_on_rate_limit() {
    let hub = hub();
    hub.transport.push_rate_limited(30);

    // A breaching heartbeat produces the notification attempt.
    hub.beat(10.0, 10.0, 96.0).await;

    let notifier = &hub.runtime.notifier;
    let queued_sends = hub.transport.sent_count();
    assert_eq!(queued_sends, 1);

    hub.clock.advance_secs(30);
    hub.transport.push_status(200);
    let processed = notifier.process_retry_queue(&hub.runtime.config.notifications).await;
    assert_eq!(processed, 1);
    assert_eq!(hub.transport.sent_count(), 2);

    // Queue is empty: another pass sends nothing.
    assert_eq!(notifier.process_retry_queue(&hub.runtime.config.notifications).await, 0);
}

// S8 — apply then remove round-trip for the minimal pack.
#[tokio::test]
async fn s8_apply_then_remove_round_trip() {
    let hub = hub();
    hub.register_readwrite("omv-media");

    let apply = hub
        .runtime
        .packs
        .create_apply(&server_id("omv-media"), "minimal", "user")
        .unwrap();
    hub.runtime.packs.execute_apply(apply.id).await.unwrap();

    let record = hub.runtime.store.read(|s| s.config_apply(apply.id).cloned()).unwrap();
    assert_eq!(record.progress, 100);
    assert_eq!(record.results.len(), 1);
    assert_eq!(record.results[0].item, "~/.hello");
    assert_eq!(record.results[0].action, "created");
    assert!(record.results[0].success);

    let results = hub.runtime.packs.remove_pack(&server_id("omv-media"), "minimal").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].action, "deleted");
    assert!(results[0].success);
    assert_eq!(
        results[0].backup_path.as_deref(),
        Some("/home/homelabcmd/.hello.homelabcmd.bak")
    );

    let commands = hub.connector.commands_on("omv-media.lan");
    assert!(commands.iter().any(|c| c.starts_with("cp \"/home/homelabcmd/.hello\"")));
    assert!(commands.iter().any(|c| c == "rm -f \"/home/homelabcmd/.hello\""));
}

// Token confidentiality: no plaintext token ever reaches the store.
#[tokio::test]
async fn token_confidentiality_property() {
    let hub = hub();
    let (_, registration) = hub
        .runtime
        .tokens
        .mint_registration(TokenMode::Readwrite, None, vec!["nginx".to_string()], None)
        .unwrap();
    let outcome = hub
        .runtime
        .tokens
        .claim_registration(&registration, &server_id("node-1"), "node-1.lan", "http://hub:8080")
        .unwrap();

    let dump = hub.runtime.store.read(|s| serde_json::to_string(s).unwrap());
    assert!(!dump.contains(&registration));
    assert!(!dump.contains(&outcome.api_token));

    // And the store round-trips through its on-disk form without them.
    hub.runtime.store.checkpoint(hub.clock.now()).unwrap();

    // Claiming twice yields the deterministic error and no second pair.
    let err = hub
        .runtime
        .tokens
        .claim_registration(&registration, &server_id("node-1"), "node-1.lan", "http://hub:8080")
        .unwrap_err();
    assert!(err.to_string().contains("already claimed"));
    hub.runtime.store.read(|s| {
        assert_eq!(s.servers.len(), 1);
        assert_eq!(s.agent_credentials.len(), 1);
    });
}

// Offline detection through the scheduler plus recovery by heartbeat.
#[tokio::test]
async fn offline_cycle_through_scheduler() {
    let hub = hub();
    hub.beat(10.0, 10.0, 10.0).await;

    hub.clock.advance_secs(300);
    hub.runtime.scheduler.tick().await;

    hub.runtime.store.read(|s| {
        assert_eq!(s.server(&server_id("omv-media")).unwrap().status, ServerStatus::Offline);
        assert!(s.open_alert(&server_id("omv-media"), "offline").is_some());
    });

    hub.clock.advance_secs(30);
    hub.beat(10.0, 10.0, 10.0).await;
    hub.runtime.store.read(|s| {
        assert_eq!(s.server(&server_id("omv-media")).unwrap().status, ServerStatus::Online);
        assert!(s.open_alert(&server_id("omv-media"), "offline").is_none());
    });
}

// Restart recovery: state survives via snapshot + WAL replay.
#[tokio::test]
async fn store_recovers_after_restart() {
    let dir = tempdir().unwrap();
    let state_dir = dir.path().join("state");

    {
        let store = HubStore::open(&state_dir).unwrap();
        store
            .commit(|_| {
                (
                    vec![Event::ServerRegistered {
                        id: server_id("omv-media"),
                        guid: hlh_core::MachineGuid::generate(),
                        hostname: Some("omv-media.lan".to_string()),
                        display_name: None,
                        at: hlh_core::test_support::test_time(),
                    }],
                    (),
                )
            })
            .unwrap();
    }

    let store = HubStore::open(&state_dir).unwrap();
    store.read(|s| {
        assert!(s.server(&server_id("omv-media")).is_some());
        assert!(s.alert_states.is_empty());
    });
}

#[tokio::test]
async fn disabled_notifications_are_intentional_success() {
    let hub = hub();
    let mut config = hub.runtime.config.notifications.clone();
    config.notify_on_critical = false;

    let event = hlh_alerting::AlertEvent::raised(
        &server_id("omv-media"),
        "omv-media",
        MetricKey::Disk,
        AlertSeverity::Critical,
        96.0,
        95.0,
        false,
    );
    let outcome = hub.runtime.notifier.send_alert(&event, &config).await;
    assert_eq!(outcome, SendOutcome::SkippedByConfig);
    assert_eq!(hub.transport.sent_count(), 0);
}
