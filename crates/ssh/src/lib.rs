// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH execution substrate.
//!
//! [`SshExecutor`] is the only sanctioned way to reach remote hosts:
//! pooled connections with a TTL, bounded connect retries, host-key
//! verification against the TOFU store, and capped command output. The
//! transport itself sits behind the [`SshConnector`] trait; production
//! uses the russh-backed [`RusshConnector`], tests use a fake.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod connector;
mod error;
mod executor;
mod transport;

pub use connector::{AuthMaterial, ConnectError, ExecOutput, PeerIdentity, SshConnector, SshSession};
pub use error::SshError;
pub use executor::{CommandResult, SshExecutor, SshTestResult};
pub use transport::RusshConnector;

#[cfg(any(test, feature = "test-support"))]
pub use connector::fake::{FakeConnector, FakeHost, FakeSession};
