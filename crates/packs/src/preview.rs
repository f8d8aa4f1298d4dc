// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dry-run previews for apply and remove. Pure summaries, no side effects.

use crate::model::Pack;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewItem {
    pub action: String,
    pub item: String,
    pub description: String,
}

/// What an apply would do, grouped for a confirmation dialog.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyPreview {
    pub pack_name: String,
    pub files: Vec<PreviewItem>,
    pub packages: Vec<PreviewItem>,
    pub settings: Vec<PreviewItem>,
    pub total_items: usize,
}

impl ApplyPreview {
    pub fn of(pack: &Pack) -> Self {
        let files = pack
            .items
            .files
            .iter()
            .map(|f| PreviewItem {
                action: "create_file".to_string(),
                item: f.path.clone(),
                description: f
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Create {} with mode {}", f.path, f.mode)),
            })
            .collect();

        let packages = pack
            .items
            .packages
            .iter()
            .map(|p| {
                let version = p
                    .min_version
                    .as_deref()
                    .map(|v| format!(" >= {v}"))
                    .unwrap_or_default();
                PreviewItem {
                    action: "install_package".to_string(),
                    item: p.name.clone(),
                    description: p
                        .description
                        .clone()
                        .unwrap_or_else(|| format!("Install {}{version}", p.name)),
                }
            })
            .collect();

        let settings = pack
            .items
            .settings
            .iter()
            .map(|s| PreviewItem {
                action: "set_env_var".to_string(),
                item: s.key.clone(),
                description: s
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Set {}={}", s.key, s.expected)),
            })
            .collect();

        Self {
            pack_name: pack.name.clone(),
            files,
            packages,
            settings,
            total_items: pack.items.total(),
        }
    }
}

/// What a removal would do.
#[derive(Debug, Clone, Serialize)]
pub struct RemovePreview {
    pub pack_name: String,
    pub files: Vec<PreviewItem>,
    pub packages: Vec<PreviewItem>,
    pub settings: Vec<PreviewItem>,
    pub total_items: usize,
}

impl RemovePreview {
    pub fn of(pack: &Pack) -> Self {
        let files = pack
            .items
            .files
            .iter()
            .map(|f| PreviewItem {
                action: "delete_file".to_string(),
                item: f.path.clone(),
                description: format!(
                    "Will delete {} (backup at {}.homelabcmd.bak)",
                    f.path, f.path
                ),
            })
            .collect();

        let packages = pack
            .items
            .packages
            .iter()
            .map(|p| PreviewItem {
                action: "skip_package".to_string(),
                item: p.name.clone(),
                description: "Package will remain installed - may break dependencies".to_string(),
            })
            .collect();

        let settings = pack
            .items
            .settings
            .iter()
            .map(|s| PreviewItem {
                action: "remove_env_var".to_string(),
                item: s.key.clone(),
                description: format!("Will remove export {} from shell config", s.key),
            })
            .collect();

        Self {
            pack_name: pack.name.clone(),
            files,
            packages,
            settings,
            total_items: pack.items.total(),
        }
    }
}

#[cfg(test)]
#[path = "preview_tests.rs"]
mod tests;
