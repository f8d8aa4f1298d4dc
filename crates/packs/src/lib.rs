// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative configuration packs.
//!
//! A pack names files, packages and settings a host should converge to.
//! Packs inherit via `extends` (parent items first), are previewed before
//! anything runs, applied over SSH with per-item progress, and removed
//! with backups. Drift detection compares the last two compliance checks
//! per `(server, pack)` and raises or resolves `config_drift` alerts.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod apply;
mod drift;
mod loader;
mod model;
mod preview;

pub use apply::{ApplyError, ConfigApplyEngine};
pub use drift::run_drift_detection;
pub use loader::{PackError, PackLoader};
pub use model::{FileItem, Pack, PackItems, PackageItem, SettingItem, SettingKind};
pub use preview::{ApplyPreview, PreviewItem, RemovePreview};
