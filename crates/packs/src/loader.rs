// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pack loading with inheritance and caching.
//!
//! Packs live as `<name>.yaml` files in one directory, templates in a
//! `templates/` subdirectory next to them. Resolution is recursive,
//! parent-first, with cycle detection. Loaded packs are cached until
//! explicitly invalidated.

use crate::model::Pack;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("pack {0:?} not found")]
    NotFound(String),
    #[error("pack {name:?} failed to parse: {reason}")]
    Parse { name: String, reason: String },
    #[error("pack inheritance cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("template {0:?} not found")]
    MissingTemplate(String),
    #[error("IO error reading pack {name:?}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Loads and caches pack documents from a directory.
pub struct PackLoader {
    pack_dir: PathBuf,
    cache: Mutex<HashMap<String, Pack>>,
}

impl PackLoader {
    pub fn new(pack_dir: impl Into<PathBuf>) -> Self {
        Self { pack_dir: pack_dir.into(), cache: Mutex::new(HashMap::new()) }
    }

    /// Load a pack with its inheritance chain resolved.
    pub fn load(&self, name: &str) -> Result<Pack, PackError> {
        if let Some(pack) = self.cache.lock().get(name) {
            return Ok(pack.clone());
        }

        let mut chain = Vec::new();
        let pack = self.load_resolved(name, &mut chain)?;

        // Every template reference must resolve before the pack is usable.
        for file in &pack.items.files {
            if let Some(template) = &file.template {
                if !self.template_path(template).is_file() {
                    return Err(PackError::MissingTemplate(template.clone()));
                }
            }
        }

        self.cache.lock().insert(name.to_string(), pack.clone());
        Ok(pack)
    }

    /// Read a template's content.
    pub fn template_content(&self, template: &str) -> Result<String, PackError> {
        let path = self.template_path(template);
        std::fs::read_to_string(&path).map_err(|_| PackError::MissingTemplate(template.to_string()))
    }

    /// List available pack names (the `.yaml` files in the pack dir).
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.pack_dir) else { return Vec::new() };
        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                let path = e.path();
                (path.extension().is_some_and(|ext| ext == "yaml"))
                    .then(|| path.file_stem()?.to_str().map(String::from))
                    .flatten()
            })
            .collect();
        names.sort();
        names
    }

    /// Drop the cache; the next load re-reads from disk.
    pub fn invalidate(&self) {
        self.cache.lock().clear();
    }

    fn load_resolved(&self, name: &str, chain: &mut Vec<String>) -> Result<Pack, PackError> {
        if chain.iter().any(|n| n == name) {
            chain.push(name.to_string());
            return Err(PackError::Cycle(std::mem::take(chain)));
        }
        chain.push(name.to_string());

        let mut pack = self.parse_file(name)?;
        if let Some(parent_name) = pack.extends.clone() {
            let parent = self.load_resolved(&parent_name, chain)?;
            pack.items.prepend(parent.items);
        }
        Ok(pack)
    }

    fn parse_file(&self, name: &str) -> Result<Pack, PackError> {
        let path = self.pack_dir.join(format!("{name}.yaml"));
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PackError::NotFound(name.to_string()))
            }
            Err(e) => return Err(PackError::Io { name: name.to_string(), source: e }),
        };
        serde_yaml::from_str(&content)
            .map_err(|e| PackError::Parse { name: name.to_string(), reason: e.to_string() })
    }

    fn template_path(&self, template: &str) -> PathBuf {
        self.pack_dir.join("templates").join(template)
    }
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
