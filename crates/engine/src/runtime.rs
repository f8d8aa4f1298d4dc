// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition root.
//!
//! The hub owns one runtime configuration and constructs each component
//! exactly once; everything downstream receives its dependencies, nothing
//! reaches for globals.

use crate::actions::ActionQueue;
use crate::heartbeat::HeartbeatIngest;
use crate::scheduler::{RolloverHook, Scheduler};
use hlh_alerting::AlertingEngine;
use hlh_core::{Clock, ConfigError, HubConfig};
use hlh_identity::{CredentialVault, HostKeyStore, TokenAuthority, VaultError};
use hlh_notify::Notifier;
use hlh_packs::{ConfigApplyEngine, PackLoader};
use hlh_ssh::{SshConnector, SshExecutor};
use hlh_storage::HubStore;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Every long-lived component of the hub, wired once.
pub struct HubRuntime<C: Clock, Conn: SshConnector> {
    pub store: HubStore,
    pub vault: Arc<CredentialVault<C>>,
    pub host_keys: Arc<HostKeyStore<C>>,
    pub tokens: Arc<TokenAuthority<C>>,
    pub executor: Arc<SshExecutor<C, Conn>>,
    pub alerting: Arc<AlertingEngine<C>>,
    pub packs: Arc<ConfigApplyEngine<C, Conn>>,
    pub heartbeats: Arc<HeartbeatIngest<C>>,
    pub actions: Arc<ActionQueue<C, Conn>>,
    pub scheduler: Arc<Scheduler<C, Conn>>,
    pub notifier: Arc<dyn Notifier>,
    pub config: HubConfig,
}

impl<C: Clock, Conn: SshConnector> HubRuntime<C, Conn> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: HubStore,
        config: HubConfig,
        encryption_key: &str,
        pack_dir: &Path,
        connector: Conn,
        notifier: Arc<dyn Notifier>,
        rollover: Arc<dyn RolloverHook>,
        clock: C,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;

        let vault = Arc::new(CredentialVault::new(store.clone(), encryption_key, clock.clone())?);
        let host_keys = Arc::new(HostKeyStore::new(store.clone(), clock.clone()));
        let tokens = Arc::new(TokenAuthority::new(
            store.clone(),
            clock.clone(),
            config.heartbeat_interval,
        ));
        let executor = Arc::new(SshExecutor::new(
            Arc::clone(&vault),
            Arc::clone(&host_keys),
            connector,
            clock.clone(),
            config.ssh.clone(),
        ));
        let loader = Arc::new(PackLoader::new(pack_dir));
        let alerting = Arc::new(AlertingEngine::new(
            store.clone(),
            clock.clone(),
            config.heartbeat_interval,
        ));
        let packs = Arc::new(ConfigApplyEngine::new(
            store.clone(),
            loader,
            Arc::clone(&executor),
            clock.clone(),
        ));
        let heartbeats = Arc::new(HeartbeatIngest::new(
            store.clone(),
            Arc::clone(&tokens),
            Arc::clone(&alerting),
            Arc::clone(&notifier),
            config.clone(),
            clock.clone(),
        ));
        let actions = Arc::new(ActionQueue::new(
            store.clone(),
            Arc::clone(&executor),
            Arc::clone(&notifier),
            config.clone(),
            clock.clone(),
        ));
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            Arc::clone(&alerting),
            Arc::clone(&notifier),
            Arc::clone(&packs),
            rollover,
            config.clone(),
            clock,
        ));

        Ok(Self {
            store,
            vault,
            host_keys,
            tokens,
            executor,
            alerting,
            packs,
            heartbeats,
            actions,
            scheduler,
            notifier,
            config,
        })
    }
}
