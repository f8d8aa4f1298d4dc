// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config pack apply/check operational records.

use crate::id::ServerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigApplyStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ConfigApplyStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Result of one applied item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyItemResult {
    pub item: String,
    /// `created` | `installed` | `set`
    pub action: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of one removed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveItemResult {
    pub item: String,
    /// `file` | `package` | `setting`
    pub item_type: String,
    /// `deleted` | `skipped` | `removed` | `failed`
    pub action: String,
    pub success: bool,
    #[serde(default)]
    pub backup_path: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One apply operation projected onto a server, with per-item progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigApply {
    pub id: u64,
    pub server_id: ServerId,
    pub pack_name: String,
    pub status: ConfigApplyStatus,
    /// 0..=100
    pub progress: u8,
    pub items_total: usize,
    pub items_completed: usize,
    pub items_failed: usize,
    pub current_item: Option<String>,
    pub results: Vec<ApplyItemResult>,
    pub error: Option<String>,
    pub triggered_by: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A single compliance mismatch found by a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    /// `missing_file` | `wrong_mode` | `missing_package` | `wrong_env_var` ...
    #[serde(rename = "type")]
    pub kind: String,
    pub item: String,
    #[serde(default)]
    pub detail: Option<String>,
}

/// One compliance check of a pack against a server. Append-only history;
/// drift detection compares the two most recent checks per pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigCheck {
    pub id: u64,
    pub server_id: ServerId,
    pub pack_name: String,
    pub is_compliant: bool,
    pub mismatches: Vec<Mismatch>,
    pub checked_at: DateTime<Utc>,
}
