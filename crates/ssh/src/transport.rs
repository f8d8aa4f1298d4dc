// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Production SSH transport on russh.
//!
//! The handler accepts whatever host key the peer presents and records
//! it; the executor performs the actual trust decision against the TOFU
//! store after the handshake, before any command runs.

use crate::connector::{AuthMaterial, ConnectError, ExecOutput, PeerIdentity, SshConnector, SshSession};
use async_trait::async_trait;
use hlh_identity::compute_fingerprint;
use parking_lot::Mutex;
use russh::client::{self, AuthResult};
use russh::keys::{decode_secret_key, PrivateKeyWithHashAlg};
use russh::ChannelMsg;
use std::sync::Arc;
use std::time::Duration;

const SSH_PORT: u16 = 22;
/// Stop buffering a stream once it exceeds the executor's cap.
const MAX_CAPTURE: usize = 10 * 1024;

struct CapturingHandler {
    peer: Arc<Mutex<Option<PeerIdentity>>>,
}

impl client::Handler for CapturingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        let raw = server_public_key.to_bytes().map_err(|_| russh::Error::UnknownKey)?;
        let identity = PeerIdentity {
            key_type: server_public_key.algorithm().to_string(),
            public_key: server_public_key
                .to_openssh()
                .unwrap_or_default()
                .split_whitespace()
                .nth(1)
                .unwrap_or_default()
                .to_string(),
            fingerprint: compute_fingerprint(&raw),
        };
        *self.peer.lock() = Some(identity);
        Ok(true)
    }
}

/// An authenticated russh session.
pub struct RusshSession {
    handle: tokio::sync::Mutex<client::Handle<CapturingHandler>>,
    peer: PeerIdentity,
}

#[async_trait]
impl SshSession for RusshSession {
    async fn exec(&self, command: &str) -> Result<ExecOutput, String> {
        let mut handle = self.handle.lock().await;
        let mut channel =
            handle.channel_open_session().await.map_err(|e| e.to_string())?;
        channel.exec(true, command).await.map_err(|e| e.to_string())?;

        let mut stdout: Vec<u8> = Vec::new();
        let mut stderr: Vec<u8> = Vec::new();
        let mut exit_code = 0i32;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => {
                    if stdout.len() < MAX_CAPTURE {
                        stdout.extend_from_slice(data);
                    }
                }
                ChannelMsg::ExtendedData { ref data, ext: 1 } => {
                    if stderr.len() < MAX_CAPTURE {
                        stderr.extend_from_slice(data);
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    exit_code = exit_status as i32;
                }
                _ => {}
            }
        }
        Ok(ExecOutput { exit_code, stdout, stderr })
    }

    async fn is_alive(&self) -> bool {
        !self.handle.lock().await.is_closed()
    }

    async fn close(&self) {
        let mut handle = self.handle.lock().await;
        let _ = handle
            .disconnect(russh::Disconnect::ByApplication, "pool eviction", "en")
            .await;
    }

    fn peer(&self) -> &PeerIdentity {
        &self.peer
    }
}

/// Connector that dials real hosts on port 22.
#[derive(Clone, Default)]
pub struct RusshConnector;

impl RusshConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SshConnector for RusshConnector {
    type Session = RusshSession;

    async fn connect(
        &self,
        hostname: &str,
        username: &str,
        auth: &AuthMaterial,
        timeout: Duration,
    ) -> Result<Self::Session, ConnectError> {
        let peer_slot = Arc::new(Mutex::new(None));
        let handler = CapturingHandler { peer: Arc::clone(&peer_slot) };
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(Duration::from_secs(300)),
            ..client::Config::default()
        });

        let connect = client::connect(config, (hostname, SSH_PORT), handler);
        let mut handle = match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => return Err(ConnectError::Transient(e.to_string())),
            Err(_) => {
                return Err(ConnectError::Transient(format!(
                    "connection to {hostname} timed out after {}s",
                    timeout.as_secs()
                )))
            }
        };

        let auth_result = match auth {
            AuthMaterial::PrivateKey(pem) => {
                let key = decode_secret_key(pem, None)
                    .map_err(|e| ConnectError::BadKey(e.to_string()))?;
                handle
                    .authenticate_publickey(
                        username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), None),
                    )
                    .await
                    .map_err(|e| ConnectError::Transient(e.to_string()))?
            }
            AuthMaterial::Password(password) => handle
                .authenticate_password(username, password)
                .await
                .map_err(|e| ConnectError::Transient(e.to_string()))?,
        };
        if !matches!(auth_result, AuthResult::Success) {
            return Err(ConnectError::Auth);
        }

        let peer = peer_slot
            .lock()
            .clone()
            .ok_or_else(|| ConnectError::Transient("handshake yielded no host key".to_string()))?;

        Ok(RusshSession { handle: tokio::sync::Mutex::new(handle), peer })
    }
}
