// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pooled, retrying SSH executor.
//!
//! Connections are pooled per hostname with a 5-minute TTL and checked
//! for liveness before reuse. Transient connect failures are retried 3
//! times with a 2-second delay; authentication failures and host-key
//! changes are terminal. Command output is capped at 10 KiB per stream.

use crate::connector::{AuthMaterial, ConnectError, SshConnector, SshSession};
use crate::error::SshError;
use chrono::{DateTime, Utc};
use hlh_core::{Clock, CredentialType, Server, ServerId, SshSettings};
use hlh_identity::{CredentialVault, HostKeyStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const POOL_TTL_SECS: i64 = 5 * 60;
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const MAX_OUTPUT: usize = 10 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// On-disk key filenames tried when the vault holds no key, in order.
const FALLBACK_KEY_FILES: &[&str] = &["id_ed25519", "id_ecdsa", "id_rsa"];

/// Result of one executed command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub hostname: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Result of a connectivity probe.
#[derive(Debug, Clone)]
pub struct SshTestResult {
    pub hostname: String,
    pub latency_ms: u64,
    pub host_key_fingerprint: String,
}

struct PoolEntry<S> {
    session: Arc<S>,
    expires_at: DateTime<Utc>,
}

/// The only sanctioned way to reach remote hosts.
pub struct SshExecutor<C: Clock, Conn: SshConnector> {
    vault: Arc<CredentialVault<C>>,
    host_keys: Arc<HostKeyStore<C>>,
    connector: Conn,
    clock: C,
    settings: SshSettings,
    pool: Mutex<HashMap<String, PoolEntry<Conn::Session>>>,
}

impl<C: Clock, Conn: SshConnector> SshExecutor<C, Conn> {
    pub fn new(
        vault: Arc<CredentialVault<C>>,
        host_keys: Arc<HostKeyStore<C>>,
        connector: Conn,
        clock: C,
        settings: SshSettings,
    ) -> Self {
        Self { vault, host_keys, connector, clock, settings, pool: Mutex::new(HashMap::new()) }
    }

    /// Execute a command on a server with a deadline (default 30 s).
    ///
    /// A transport failure mid-command evicts the pooled connection and
    /// retries once on a fresh one.
    pub async fn execute(
        &self,
        server: &Server,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandResult, SshError> {
        if command.trim().is_empty() {
            return Err(SshError::EmptyCommand);
        }
        let hostname = self.target_of(server)?;
        let username = self.username_for(server)?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);

        tracing::info!(
            server_id = %server.id,
            hostname = %hostname,
            command = %command.chars().take(100).collect::<String>(),
            "executing remote command"
        );

        let started = std::time::Instant::now();
        let session = self.connection(&hostname, &username, &server.id).await?;

        let first = tokio::time::timeout(timeout, session.exec(command)).await;
        let output = match first {
            Ok(Ok(output)) => output,
            Ok(Err(message)) => {
                // Connection dropped mid-command: evict and retry once.
                tracing::warn!(
                    server_id = %server.id,
                    error = %message,
                    "transport failure during command, retrying on a fresh connection"
                );
                self.evict(&hostname).await;
                let session = self.connection(&hostname, &username, &server.id).await?;
                match tokio::time::timeout(timeout, session.exec(command)).await {
                    Ok(Ok(output)) => output,
                    Ok(Err(message)) => {
                        self.evict(&hostname).await;
                        return Err(SshError::Transport { hostname, message });
                    }
                    Err(_) => {
                        self.evict(&hostname).await;
                        return Err(SshError::timeout(&hostname, command, timeout.as_secs()));
                    }
                }
            }
            Err(_) => {
                // Deadline expired; the connection is suspect.
                self.evict(&hostname).await;
                return Err(SshError::timeout(&hostname, command, timeout.as_secs()));
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let result = CommandResult {
            exit_code: output.exit_code,
            stdout: cap_output(&output.stdout),
            stderr: cap_output(&output.stderr),
            duration_ms,
            hostname,
        };
        if result.success() {
            tracing::info!(server_id = %server.id, duration_ms, "command completed");
        } else {
            tracing::warn!(
                server_id = %server.id,
                exit_code = result.exit_code,
                duration_ms,
                "command finished with non-zero exit"
            );
        }
        Ok(result)
    }

    /// Run the connect pipeline (including TOFU verification) without
    /// executing anything.
    pub async fn test(&self, server: &Server) -> Result<SshTestResult, SshError> {
        let hostname = self.target_of(server)?;
        let username = self.username_for(server)?;
        let started = std::time::Instant::now();
        let session = self.connection(&hostname, &username, &server.id).await?;
        Ok(SshTestResult {
            hostname,
            latency_ms: started.elapsed().as_millis() as u64,
            host_key_fingerprint: session.peer().fingerprint.clone(),
        })
    }

    /// Close every pooled connection. Must be called when the SSH key
    /// changes so stale sessions cannot outlive the old key.
    pub async fn clear_pool(&self) {
        let entries: Vec<PoolEntry<Conn::Session>> =
            self.pool.lock().drain().map(|(_, e)| e).collect();
        for entry in &entries {
            entry.session.close().await;
        }
        tracing::info!(closed = entries.len(), "cleared SSH connection pool");
    }

    /// Get or create a pooled connection, verifying the host key.
    async fn connection(
        &self,
        hostname: &str,
        username: &str,
        machine_id: &ServerId,
    ) -> Result<Arc<Conn::Session>, SshError> {
        if let Some(session) = self.pooled(hostname) {
            if session.is_alive().await {
                tracing::debug!(%hostname, "reusing pooled connection");
                return Ok(session);
            }
            self.evict(hostname).await;
        }

        let auth = self.auth_material()?;
        let stored_key = self.host_keys.get(machine_id);
        let connect_timeout = Duration::from_secs(self.settings.connect_timeout_seconds);

        let mut last_error = String::new();
        for attempt in 1..=MAX_RETRIES {
            match self.connector.connect(hostname, username, &auth, connect_timeout).await {
                Ok(session) => {
                    let peer = session.peer().clone();
                    match &stored_key {
                        None => {
                            self.host_keys.store_key(
                                machine_id,
                                hostname,
                                &peer.key_type,
                                &peer.public_key,
                                &peer.fingerprint,
                            )?;
                        }
                        Some(stored) if stored.fingerprint == peer.fingerprint => {
                            self.host_keys.update_last_seen(machine_id)?;
                        }
                        Some(stored) => {
                            // Potential MITM. Close and refuse; no retry.
                            session.close().await;
                            tracing::warn!(
                                machine_id = %machine_id,
                                %hostname,
                                stored = %stored.fingerprint,
                                presented = %peer.fingerprint,
                                "host key changed, refusing connection"
                            );
                            return Err(SshError::HostKeyChanged {
                                hostname: hostname.to_string(),
                                stored: stored.fingerprint.clone(),
                                presented: peer.fingerprint,
                            });
                        }
                    }

                    let session = Arc::new(session);
                    self.pool.lock().insert(
                        hostname.to_string(),
                        PoolEntry {
                            session: Arc::clone(&session),
                            expires_at: self.clock.now() + chrono::Duration::seconds(POOL_TTL_SECS),
                        },
                    );
                    return Ok(session);
                }
                Err(ConnectError::Auth) => {
                    tracing::warn!(%hostname, %username, "SSH authentication failed");
                    return Err(SshError::Authentication {
                        hostname: hostname.to_string(),
                        username: username.to_string(),
                    });
                }
                Err(ConnectError::BadKey(message)) => {
                    return Err(SshError::KeyParse(message));
                }
                Err(ConnectError::Transient(message)) => {
                    tracing::warn!(
                        %hostname,
                        attempt,
                        max = MAX_RETRIES,
                        error = %message,
                        "SSH connection attempt failed"
                    );
                    last_error = message;
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        Err(SshError::Connection {
            hostname: hostname.to_string(),
            attempts: MAX_RETRIES,
            last_error,
        })
    }

    fn pooled(&self, hostname: &str) -> Option<Arc<Conn::Session>> {
        let mut pool = self.pool.lock();
        match pool.get(hostname) {
            Some(entry) if self.clock.now() < entry.expires_at => Some(Arc::clone(&entry.session)),
            Some(_) => {
                // Expired entries are closed lazily on next access.
                pool.remove(hostname);
                None
            }
            None => None,
        }
    }

    async fn evict(&self, hostname: &str) {
        let entry = self.pool.lock().remove(hostname);
        if let Some(entry) = entry {
            entry.session.close().await;
        }
    }

    /// Private key from the vault, else the well-known on-disk locations.
    fn auth_material(&self) -> Result<AuthMaterial, SshError> {
        if let Some(key) = self.vault.get(CredentialType::SshPrivateKey, None)? {
            return Ok(AuthMaterial::PrivateKey(key));
        }
        for name in FALLBACK_KEY_FILES {
            let path = self.settings.key_dir.join(name);
            if let Some(content) = read_key_file(&path) {
                tracing::debug!(path = %path.display(), "using on-disk SSH key");
                return Ok(AuthMaterial::PrivateKey(content));
            }
        }
        Err(SshError::KeyNotConfigured)
    }

    /// The username `execute` would log in with. Config apply uses this
    /// for `~` expansion on the remote side.
    pub fn resolve_username(&self, server: &Server) -> Result<String, SshError> {
        self.username_for(server)
    }

    fn username_for(&self, server: &Server) -> Result<String, SshError> {
        if let Some(username) = &server.ssh_username {
            return Ok(username.clone());
        }
        if let Some(username) = self.vault.get(CredentialType::SshUsername, None)? {
            return Ok(username);
        }
        Ok(self.settings.default_username.clone())
    }

    fn target_of(&self, server: &Server) -> Result<String, SshError> {
        server
            .ssh_target()
            .map(String::from)
            .ok_or_else(|| SshError::NoTarget(server.id.to_string()))
    }
}

fn read_key_file(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok().filter(|s| !s.trim().is_empty())
}

/// Truncate raw output to the 10 KiB contract, lossily decoding UTF-8.
fn cap_output(raw: &[u8]) -> String {
    let slice = if raw.len() > MAX_OUTPUT { &raw[..MAX_OUTPUT] } else { raw };
    String::from_utf8_lossy(slice).into_owned()
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
