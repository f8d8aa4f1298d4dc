// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pack document model.

use serde::{Deserialize, Serialize};

/// One file to project onto the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileItem {
    /// May contain `~`, expanded against the resolved SSH user's home.
    pub path: String,
    /// Octal string, e.g. `"0644"`.
    pub mode: String,
    /// Name of a template file next to the packs directory.
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageItem {
    pub name: String,
    #[serde(default)]
    pub min_version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// The only supported setting type today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    EnvVar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingItem {
    #[serde(rename = "type")]
    pub kind: SettingKind,
    pub key: String,
    pub expected: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackItems {
    #[serde(default)]
    pub files: Vec<FileItem>,
    #[serde(default)]
    pub packages: Vec<PackageItem>,
    #[serde(default)]
    pub settings: Vec<SettingItem>,
}

impl PackItems {
    pub fn total(&self) -> usize {
        self.files.len() + self.packages.len() + self.settings.len()
    }

    /// Parent items come first so children override by coming later.
    pub fn prepend(&mut self, parent: PackItems) {
        let mut files = parent.files;
        files.append(&mut self.files);
        self.files = files;

        let mut packages = parent.packages;
        packages.append(&mut self.packages);
        self.packages = packages;

        let mut settings = parent.settings;
        settings.append(&mut self.settings);
        self.settings = settings;
    }
}

/// A declarative bundle of files, packages and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Parent pack name; items are concatenated parent-first.
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub items: PackItems,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
