// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use anyhow::{Context, Result};
use hlh_core::{SystemClock, TokenMode};
use hlh_identity::TokenAuthority;
use hlh_storage::HubStore;
use std::path::Path;

pub fn run(
    state_dir: &Path,
    readwrite: bool,
    name: Option<String>,
    services: Vec<String>,
    expiry_minutes: Option<i64>,
) -> Result<()> {
    let store = HubStore::open(state_dir)
        .with_context(|| format!("opening store in {}", state_dir.display()))?;
    let tokens = TokenAuthority::new(store, SystemClock, 60);

    let mode = if readwrite { TokenMode::Readwrite } else { TokenMode::Readonly };
    let (record, plaintext) = tokens
        .mint_registration(mode, name, services, expiry_minutes)
        .context("minting registration token")?;

    println!("{plaintext}");
    eprintln!();
    eprintln!("prefix:  {}", record.prefix);
    eprintln!("mode:    {:?}", record.mode);
    eprintln!("expires: {}", record.expires_at.format("%Y-%m-%d %H:%M UTC"));
    eprintln!("The full token is shown once; only its hash is stored.");
    Ok(())
}
