// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test fixture: a fully wired runtime on fakes.

use crate::runtime::HubRuntime;
use crate::scheduler::NoopRollover;
use hlh_core::test_support::{guid, server_id, test_time, TEST_GUID};
use hlh_core::{AgentMode, Event, FakeClock, HubConfig, MetricThreshold, ServerId};
use hlh_identity::CredentialVault;
use hlh_notify::FakeNotifier;
use hlh_ssh::{FakeConnector, FakeHost};
use hlh_storage::HubStore;
use std::fs;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

pub struct Rig {
    pub runtime: HubRuntime<FakeClock, FakeConnector>,
    pub connector: FakeConnector,
    pub notifier: FakeNotifier,
    pub clock: FakeClock,
    pub _dir: TempDir,
}

pub fn config() -> HubConfig {
    let mut config = HubConfig::default();
    config.hub_url = Some("http://hub:8080".to_string());
    config.thresholds.cpu = MetricThreshold::new(85.0, 95.0, 180);
    config.thresholds.memory = MetricThreshold::new(85.0, 95.0, 180);
    config.thresholds.disk = MetricThreshold::new(80.0, 95.0, 0);
    config.thresholds.server_offline_seconds = 120;
    config.legacy_api_key = Some("legacy-shared-key".to_string());
    config
}

pub fn rig_with(config: HubConfig) -> Rig {
    let dir = tempdir().unwrap();
    let store = HubStore::open(&dir.path().join("state")).unwrap();
    let pack_dir = dir.path().join("packs");
    fs::create_dir_all(pack_dir.join("templates")).unwrap();

    let clock = FakeClock::new();
    let connector = FakeConnector::new();
    let notifier = FakeNotifier::new();
    let key = CredentialVault::<FakeClock>::generate_key();

    let mut config = config;
    config.ssh.key_dir = dir.path().join("no-keys");

    let runtime = HubRuntime::new(
        store,
        config,
        &key,
        &pack_dir,
        connector.clone(),
        Arc::new(notifier.clone()),
        Arc::new(NoopRollover),
        clock.clone(),
    )
    .unwrap();

    // The executor needs a key; tests use the vault path.
    runtime
        .vault
        .store(hlh_core::CredentialType::SshPrivateKey, "-----BEGIN KEY-----", None)
        .unwrap();

    Rig { runtime, connector, notifier, clock, _dir: dir }
}

pub fn rig() -> Rig {
    rig_with(config())
}

impl Rig {
    /// Register a server directly in the store, bypassing the claim flow.
    pub fn register_server(&self, id: &str, mode: AgentMode) -> ServerId {
        let sid = server_id(id);
        self.runtime
            .store
            .commit(|_| {
                (
                    vec![
                        Event::ServerRegistered {
                            id: server_id(id),
                            guid: guid(TEST_GUID),
                            hostname: Some(format!("{id}.lan")),
                            display_name: None,
                            at: test_time(),
                        },
                        Event::ServerInfoUpdated {
                            id: server_id(id),
                            os_info: None,
                            cpu_info: None,
                            agent_version: None,
                            agent_mode: Some(mode),
                            reboot_required: None,
                            category: None,
                        },
                    ],
                    (),
                )
            })
            .unwrap();
        self.connector.add_host(&format!("{id}.lan"), FakeHost::new("SHA256:aaa"));
        sid
    }

    pub fn pause(&self, id: &ServerId) {
        self.runtime
            .store
            .commit(|_| {
                (vec![Event::ServerPaused { id: id.clone(), paused: true, at: test_time() }], ())
            })
            .unwrap();
    }
}
