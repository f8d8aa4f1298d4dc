// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The transport seam.
//!
//! The executor speaks to remote hosts only through these traits. The
//! connector hands back an authenticated session together with the peer's
//! host key identity; the executor decides whether to trust it.

use async_trait::async_trait;
use std::time::Duration;

/// The peer's host key as observed during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    /// e.g. `ssh-ed25519`
    pub key_type: String,
    /// base64 body of the public key
    pub public_key: String,
    /// `SHA256:...`, unpadded
    pub fingerprint: String,
}

/// How to authenticate the connection.
pub enum AuthMaterial {
    PrivateKey(String),
    Password(String),
}

/// Raw result of one remote command.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Connect-phase failures, split by retry policy.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Credentials rejected. Never retried.
    #[error("authentication rejected")]
    Auth,
    /// The private key content could not be parsed. Never retried.
    #[error("unusable private key: {0}")]
    BadKey(String),
    /// Network-level trouble (refused, unreachable, handshake timeout).
    /// Retried with a fixed delay.
    #[error("{0}")]
    Transient(String),
}

/// An open, authenticated SSH session.
#[async_trait]
pub trait SshSession: Send + Sync + 'static {
    /// Run one command and collect its output. Errors are transport
    /// failures; a non-zero exit status is a successful execution.
    async fn exec(&self, command: &str) -> Result<ExecOutput, String>;

    /// Whether the underlying transport is still usable.
    async fn is_alive(&self) -> bool;

    async fn close(&self);

    fn peer(&self) -> &PeerIdentity;
}

/// Opens authenticated sessions to remote hosts.
#[async_trait]
pub trait SshConnector: Send + Sync + 'static {
    type Session: SshSession;

    async fn connect(
        &self,
        hostname: &str,
        username: &str,
        auth: &AuthMaterial,
        timeout: Duration,
    ) -> Result<Self::Session, ConnectError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    type FailureCounts = HashMap<String, u32>;

    /// Scripted behavior for one fake host.
    #[derive(Clone)]
    pub struct FakeHost {
        pub fingerprint: String,
        pub key_type: String,
        /// Command results by exact command string; anything not listed
        /// succeeds with empty output.
        pub responses: HashMap<String, (i32, Vec<u8>, Vec<u8>)>,
        /// Connect attempts that fail transiently before one succeeds.
        pub transient_failures: u32,
        /// Reject authentication outright.
        pub reject_auth: bool,
        /// Commands that hang until the caller's deadline fires.
        pub hang_on: Vec<String>,
        /// Commands that kill the transport mid-exec.
        pub drop_on: Vec<String>,
    }

    impl FakeHost {
        pub fn new(fingerprint: &str) -> Self {
            Self {
                fingerprint: fingerprint.to_string(),
                key_type: "ssh-ed25519".to_string(),
                responses: HashMap::new(),
                transient_failures: 0,
                reject_auth: false,
                hang_on: Vec::new(),
                drop_on: Vec::new(),
            }
        }

        pub fn respond(mut self, command: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
            self.responses.insert(
                command.to_string(),
                (exit_code, stdout.as_bytes().to_vec(), stderr.as_bytes().to_vec()),
            );
            self
        }
    }

    pub struct FakeSession {
        host: FakeHost,
        peer: PeerIdentity,
        alive: AtomicBool,
        /// Commands executed on this session, in order.
        pub log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SshSession for FakeSession {
        async fn exec(&self, command: &str) -> Result<ExecOutput, String> {
            if !self.alive.load(Ordering::SeqCst) {
                return Err("transport closed".to_string());
            }
            if self.host.hang_on.iter().any(|c| c == command) {
                // Park until the caller's timeout aborts us.
                std::future::pending::<()>().await;
            }
            self.log.lock().push(command.to_string());
            if self.host.drop_on.iter().any(|c| c == command) {
                self.alive.store(false, Ordering::SeqCst);
                return Err("connection reset by peer".to_string());
            }
            let (exit_code, stdout, stderr) = self
                .host
                .responses
                .get(command)
                .cloned()
                .unwrap_or((0, Vec::new(), Vec::new()));
            Ok(ExecOutput { exit_code, stdout, stderr })
        }

        async fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        async fn close(&self) {
            self.alive.store(false, Ordering::SeqCst);
        }

        fn peer(&self) -> &PeerIdentity {
            &self.peer
        }
    }

    /// In-memory connector with scripted hosts and full observability.
    #[derive(Clone, Default)]
    pub struct FakeConnector {
        hosts: Arc<Mutex<HashMap<String, FakeHost>>>,
        failures_seen: Arc<Mutex<FailureCounts>>,
        /// Every command executed through any session, with hostname.
        pub executed: Arc<Mutex<Vec<(String, String)>>>,
        connect_count: Arc<AtomicU32>,
    }

    impl FakeConnector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_host(&self, hostname: &str, host: FakeHost) {
            self.hosts.lock().insert(hostname.to_string(), host);
        }

        /// Change the presented host key (simulates re-imaging / MITM).
        pub fn set_fingerprint(&self, hostname: &str, fingerprint: &str) {
            if let Some(host) = self.hosts.lock().get_mut(hostname) {
                host.fingerprint = fingerprint.to_string();
            }
        }

        pub fn connects(&self) -> u32 {
            self.connect_count.load(Ordering::SeqCst)
        }

        pub fn commands_on(&self, hostname: &str) -> Vec<String> {
            self.executed
                .lock()
                .iter()
                .filter(|(h, _)| h == hostname)
                .map(|(_, c)| c.clone())
                .collect()
        }
    }

    pub struct ObservedSession {
        inner: FakeSession,
        hostname: String,
        executed: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl SshSession for ObservedSession {
        async fn exec(&self, command: &str) -> Result<ExecOutput, String> {
            if self.inner.is_alive().await {
                self.executed.lock().push((self.hostname.clone(), command.to_string()));
            }
            self.inner.exec(command).await
        }

        async fn is_alive(&self) -> bool {
            self.inner.is_alive().await
        }

        async fn close(&self) {
            self.inner.close().await
        }

        fn peer(&self) -> &PeerIdentity {
            self.inner.peer()
        }
    }

    #[async_trait]
    impl SshConnector for FakeConnector {
        type Session = ObservedSession;

        async fn connect(
            &self,
            hostname: &str,
            _username: &str,
            _auth: &AuthMaterial,
            _timeout: Duration,
        ) -> Result<Self::Session, ConnectError> {
            self.connect_count.fetch_add(1, Ordering::SeqCst);
            let host = self
                .hosts
                .lock()
                .get(hostname)
                .cloned()
                .ok_or_else(|| ConnectError::Transient(format!("no route to {hostname}")))?;

            if host.reject_auth {
                return Err(ConnectError::Auth);
            }
            if host.transient_failures > 0 {
                let mut failures = self.failures_seen.lock();
                let count = failures.entry(hostname.to_string()).or_insert(0);
                if *count < host.transient_failures {
                    *count += 1;
                    return Err(ConnectError::Transient("connection refused".to_string()));
                }
            }

            let peer = PeerIdentity {
                key_type: host.key_type.clone(),
                public_key: "AAAAC3NzaC1lZDI1NTE5".to_string(),
                fingerprint: host.fingerprint.clone(),
            };
            Ok(ObservedSession {
                inner: FakeSession {
                    host,
                    peer,
                    alive: AtomicBool::new(true),
                    log: Arc::new(Mutex::new(Vec::new())),
                },
                hostname: hostname.to_string(),
                executed: Arc::clone(&self.executed),
            })
        }
    }
}
