// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator CLI for the homelab hub.
//!
//! `hlh serve` runs the control plane (scheduler loop and background
//! work); the HTTP transport is a separate adapter mounted on top of the
//! engine's services. `hlh gen-key` and `hlh mint-token` are the two
//! operator workflows needed before the first agent can register.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const VERSION: &str =
    concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_GIT_HASH"), ")");

#[derive(Parser)]
#[command(name = "hlh", version = VERSION, about = "Homelab hub control plane")]
struct Cli {
    /// State directory (store, WAL, snapshots). Defaults to the platform
    /// data dir, e.g. ~/.local/share/hlh.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the hub.
    Serve {
        /// YAML config file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory holding pack documents and templates.
        #[arg(long)]
        packs: Option<PathBuf>,
    },
    /// Generate a vault encryption key for HLH_ENCRYPTION_KEY.
    GenKey,
    /// Mint a registration token for a new agent.
    MintToken {
        /// Grant the agent readwrite mode (remote command execution).
        #[arg(long)]
        readwrite: bool,
        /// Display name for the new server.
        #[arg(long)]
        name: Option<String>,
        /// Services the agent should monitor (repeatable).
        #[arg(long = "service")]
        services: Vec<String>,
        /// Token lifetime in minutes (default 1440).
        #[arg(long)]
        expiry_minutes: Option<i64>,
    },
}

fn state_dir(cli: &Cli) -> PathBuf {
    cli.state_dir.clone().unwrap_or_else(|| {
        dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("hlh")
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let state_dir = state_dir(&cli);

    match cli.command {
        Command::Serve { config, packs } => commands::serve::run(&state_dir, config, packs),
        Command::GenKey => {
            commands::gen_key::run();
            Ok(())
        }
        Command::MintToken { readwrite, name, services, expiry_minutes } => {
            commands::mint_token::run(&state_dir, readwrite, name, services, expiry_minutes)
        }
    }
}
