// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alerting engine: threshold evaluation and notification decisions.
//!
//! The model is two-dimensional. The threshold level (high/critical)
//! decides severity; time decides when to fire (sustained breaches), when
//! to repeat (cooldowns), and when to let go (auto-resolve below the high
//! threshold, giving hysteresis around the critical line).
//!
//! The evaluator returns plain [`AlertEvent`] values; persistence happens
//! in the same store commit, and notification dispatch is the caller's
//! concern. Tests can assert on the event list alone.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod engine;
mod events;

pub use engine::{AlertOpError, AlertingEngine};
pub use events::AlertEvent;
