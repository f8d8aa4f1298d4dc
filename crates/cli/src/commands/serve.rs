// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use anyhow::{bail, Context, Result};
use hlh_core::{HubConfig, SystemClock};
use hlh_engine::{HubRuntime, NoopRollover};
use hlh_notify::{ReqwestTransport, SlackNotifier};
use hlh_ssh::RusshConnector;
use hlh_storage::HubStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const KEY_ENV: &str = "HLH_ENCRYPTION_KEY";

pub fn run(state_dir: &Path, config_path: Option<PathBuf>, packs: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let Ok(encryption_key) = std::env::var(KEY_ENV) else {
        bail!("{KEY_ENV} is not set; generate one with `hlh gen-key`");
    };

    let pack_dir = packs.unwrap_or_else(|| state_dir.join("packs"));
    std::fs::create_dir_all(&pack_dir)
        .with_context(|| format!("creating pack dir {}", pack_dir.display()))?;

    let store = HubStore::open(state_dir)
        .with_context(|| format!("opening store in {}", state_dir.display()))?;

    let notifier = Arc::new(SlackNotifier::new(ReqwestTransport::new(), SystemClock));
    let runtime = HubRuntime::new(
        store,
        config,
        &encryption_key,
        &pack_dir,
        RusshConnector::new(),
        notifier,
        Arc::new(NoopRollover),
        SystemClock,
    )
    .context("building hub runtime")?;

    tracing::info!(
        state_dir = %state_dir.display(),
        packs = %pack_dir.display(),
        "hub starting"
    );

    let body = async {
        let scheduler = Arc::clone(&runtime.scheduler);
        let scheduler_task = tokio::spawn(scheduler.run());

        tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
        tracing::info!("shutdown signal received");

        scheduler_task.abort();
        runtime.executor.clear_pool().await;
        runtime.store.checkpoint(chrono_now()).context("final checkpoint")?;
        Ok::<(), anyhow::Error>(())
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?
        .block_on(body)
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

fn load_config(path: Option<&Path>) -> Result<HubConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_yaml::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => HubConfig::default(),
    };
    config.validate().context("validating config")?;
    Ok(config)
}
