// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Applying and removing packs on a remote host.
//!
//! An apply is a persistent record with per-item progress; the execution
//! body is meant to run as a background task. Removal backs files up
//! before deleting and intentionally leaves packages installed.

use crate::loader::{PackError, PackLoader};
use crate::model::{FileItem, PackageItem, SettingItem, SettingKind};
use crate::preview::{ApplyPreview, RemovePreview};
use chrono::{DateTime, Utc};
use hlh_core::{
    ApplyItemResult, Clock, ConfigApply, ConfigApplyStatus, ConfigCheck, Event, Mismatch,
    RemoveItemResult, Server, ServerId,
};
use hlh_ssh::{SshConnector, SshError, SshExecutor};
use hlh_storage::{HubStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Fixed, improbable heredoc delimiter so file content cannot collide.
const HEREDOC_DELIMITER: &str = "HOMELAB_HUB_EOF_7f3d9c";
const BACKUP_SUFFIX: &str = ".homelabcmd.bak";
const PACKAGE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("server not found: {0}")]
    ServerNotFound(ServerId),
    #[error("an apply operation is already running for server: {0}")]
    AlreadyRunning(ServerId),
    #[error("apply {0} not found")]
    ApplyNotFound(u64),
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error("SSH unavailable: {0}")]
    SshUnavailable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Projects packs onto hosts and verifies compliance afterwards.
pub struct ConfigApplyEngine<C: Clock, Conn: SshConnector> {
    store: HubStore,
    loader: Arc<PackLoader>,
    executor: Arc<SshExecutor<C, Conn>>,
    clock: C,
}

impl<C: Clock, Conn: SshConnector> ConfigApplyEngine<C, Conn> {
    pub fn new(
        store: HubStore,
        loader: Arc<PackLoader>,
        executor: Arc<SshExecutor<C, Conn>>,
        clock: C,
    ) -> Self {
        Self { store, loader, executor, clock }
    }

    /// Dry-run preview. No side effects.
    pub fn preview(&self, server_id: &ServerId, pack_name: &str) -> Result<ApplyPreview, ApplyError> {
        self.require_server(server_id)?;
        let pack = self.loader.load(pack_name)?;
        Ok(ApplyPreview::of(&pack))
    }

    pub fn remove_preview(
        &self,
        server_id: &ServerId,
        pack_name: &str,
    ) -> Result<RemovePreview, ApplyError> {
        self.require_server(server_id)?;
        let pack = self.loader.load(pack_name)?;
        Ok(RemovePreview::of(&pack))
    }

    /// Create the apply record. One non-terminal apply per server.
    pub fn create_apply(
        &self,
        server_id: &ServerId,
        pack_name: &str,
        triggered_by: &str,
    ) -> Result<ConfigApply, ApplyError> {
        self.require_server(server_id)?;
        let pack = self.loader.load(pack_name)?;
        let now = self.clock.now();

        let outcome = self.store.commit(|state| {
            if state.server(server_id).is_none() {
                return (vec![], Err(ApplyError::ServerNotFound(server_id.clone())));
            }
            if state.running_apply(server_id).is_some() {
                return (vec![], Err(ApplyError::AlreadyRunning(server_id.clone())));
            }
            let record = ConfigApply {
                id: state.allocate_apply_id(),
                server_id: server_id.clone(),
                pack_name: pack_name.to_string(),
                status: ConfigApplyStatus::Pending,
                progress: 0,
                items_total: pack.items.total(),
                items_completed: 0,
                items_failed: 0,
                current_item: None,
                results: Vec::new(),
                error: None,
                triggered_by: triggered_by.to_string(),
                created_at: now,
                started_at: None,
                completed_at: None,
            };
            (vec![Event::ApplyCreated { record: record.clone() }], Ok(record))
        })?;
        outcome
    }

    /// Execute an apply. Runs as a background task; all failures end up
    /// on the record, not in a panic.
    pub async fn execute_apply(&self, apply_id: u64) -> Result<(), ApplyError> {
        let (server, pack_name) = {
            let found = self.store.read(|state| {
                state
                    .config_apply(apply_id)
                    .map(|a| (state.server(&a.server_id).cloned(), a.pack_name.clone()))
            });
            match found {
                None => return Err(ApplyError::ApplyNotFound(apply_id)),
                Some((None, _)) => {
                    self.fail_apply(apply_id, "server not found").await?;
                    return Ok(());
                }
                Some((Some(server), pack_name)) => (server, pack_name),
            }
        };

        self.store
            .commit(|_| (vec![Event::ApplyStarted { id: apply_id, at: self.clock.now() }], ()))?;

        let pack = match self.loader.load(&pack_name) {
            Ok(pack) => pack,
            Err(e) => {
                self.fail_apply(apply_id, &e.to_string()).await?;
                return Ok(());
            }
        };

        let username = match self.executor.resolve_username(&server) {
            Ok(username) => username,
            Err(e) => {
                self.fail_apply(apply_id, &e.to_string()).await?;
                return Ok(());
            }
        };

        let mut results: Vec<ApplyItemResult> = Vec::new();
        let mut completed = 0usize;
        let mut failed = 0usize;
        let total = pack.items.total().max(1);

        enum Item<'a> {
            File(&'a FileItem),
            Package(&'a PackageItem),
            Setting(&'a SettingItem),
        }
        let items = pack
            .items
            .files
            .iter()
            .map(Item::File)
            .chain(pack.items.packages.iter().map(Item::Package))
            .chain(pack.items.settings.iter().map(Item::Setting));

        for item in items {
            let label = match &item {
                Item::File(f) => f.path.clone(),
                Item::Package(p) => format!("package:{}", p.name),
                Item::Setting(s) => format!("setting:{}", s.key),
            };
            self.progress(apply_id, Some(label), &results, completed, failed, total)?;

            let result = match item {
                Item::File(f) => self.apply_file(&server, &username, f).await,
                Item::Package(p) => self.apply_package(&server, p).await,
                Item::Setting(s) => self.apply_setting(&server, &username, s).await,
            };

            // Fatal connectivity problems abort the whole apply.
            let result = match result {
                Ok(result) => result,
                Err(e) => {
                    self.fail_apply(apply_id, &e.to_string()).await?;
                    return Ok(());
                }
            };

            if result.success {
                completed += 1;
            } else {
                failed += 1;
            }
            results.push(result);
            self.progress(apply_id, None, &results, completed, failed, total)?;
        }

        let now = self.clock.now();
        self.store.commit(|_| {
            (vec![Event::ApplyCompleted { id: apply_id, at: now, results: results.clone() }], ())
        })?;

        tracing::info!(
            apply_id,
            server_id = %server.id,
            completed,
            failed,
            "config apply finished"
        );

        // Recheck compliance once everything landed cleanly.
        if failed == 0 {
            if let Err(e) = self.check_compliance(&server.id, &pack_name).await {
                tracing::warn!(apply_id, error = %e, "post-apply compliance recheck failed");
            }
        }
        Ok(())
    }

    /// Remove a pack's footprint from a server. Files are backed up then
    /// deleted, settings stripped, packages left installed.
    pub async fn remove_pack(
        &self,
        server_id: &ServerId,
        pack_name: &str,
    ) -> Result<Vec<RemoveItemResult>, ApplyError> {
        let server = self.require_server(server_id)?;
        let pack = self.loader.load(pack_name)?;
        let username =
            self.executor.resolve_username(&server).map_err(|e| ApplyError::SshUnavailable(e.to_string()))?;

        let mut results = Vec::new();

        for file in &pack.items.files {
            results.push(self.remove_file(&server, &username, file).await?);
        }
        for package in &pack.items.packages {
            results.push(RemoveItemResult {
                item: package.name.clone(),
                item_type: "package".to_string(),
                action: "skipped".to_string(),
                success: true,
                backup_path: None,
                note: Some("Package not removed - may break dependencies".to_string()),
                error: None,
            });
        }
        for setting in &pack.items.settings {
            results.push(self.remove_setting(&server, &username, setting).await?);
        }

        let deleted = results.iter().filter(|r| r.action == "deleted").count();
        let skipped = results.iter().filter(|r| r.action == "skipped").count();
        let removed = results.iter().filter(|r| r.action == "removed").count();
        let failed = results.iter().filter(|r| r.action == "failed").count();
        tracing::info!(
            pack = pack_name,
            server_id = %server_id,
            deleted,
            skipped,
            removed,
            failed,
            "config pack removed"
        );

        Ok(results)
    }

    /// Verify the host against a pack and record the result. Drift
    /// detection compares consecutive check records.
    pub async fn check_compliance(
        &self,
        server_id: &ServerId,
        pack_name: &str,
    ) -> Result<ConfigCheck, ApplyError> {
        let server = self.require_server(server_id)?;
        let pack = self.loader.load(pack_name)?;
        let username = self
            .executor
            .resolve_username(&server)
            .map_err(|e| ApplyError::SshUnavailable(e.to_string()))?;
        let home = home_dir(&username);

        let mut mismatches: Vec<Mismatch> = Vec::new();

        for file in &pack.items.files {
            let path = expand_home(&file.path, &home);
            let cmd = format!("stat -c '%a' \"{path}\" 2>/dev/null || echo missing");
            let result = self.exec(&server, &cmd, None).await?;
            let out = result.stdout.trim().to_string();
            if out == "missing" || out.is_empty() {
                mismatches.push(Mismatch {
                    kind: "missing_file".to_string(),
                    item: file.path.clone(),
                    detail: None,
                });
            } else if out != file.mode.trim_start_matches('0') && out != file.mode {
                mismatches.push(Mismatch {
                    kind: "wrong_mode".to_string(),
                    item: file.path.clone(),
                    detail: Some(format!("expected {}, found {out}", file.mode)),
                });
            }
        }

        for package in &pack.items.packages {
            let cmd = format!(
                "dpkg-query -W -f='${{Status}}' {} 2>/dev/null || echo missing",
                package.name
            );
            let result = self.exec(&server, &cmd, None).await?;
            if !result.stdout.contains("install ok installed") {
                mismatches.push(Mismatch {
                    kind: "missing_package".to_string(),
                    item: package.name.clone(),
                    detail: None,
                });
            }
        }

        for setting in &pack.items.settings {
            debug_assert_eq!(setting.kind, SettingKind::EnvVar);
            let env_file = format!("{home}/.bashrc.d/env.sh");
            let cmd = format!(
                "grep -q '^export {}=' \"{env_file}\" && echo present || echo missing",
                setting.key
            );
            let result = self.exec(&server, &cmd, None).await?;
            if !result.stdout.contains("present") {
                mismatches.push(Mismatch {
                    kind: "missing_env_var".to_string(),
                    item: setting.key.clone(),
                    detail: None,
                });
            }
        }

        let now = self.clock.now();
        let record = self.store.commit(|state| {
            let record = ConfigCheck {
                id: state.allocate_check_id(),
                server_id: server_id.clone(),
                pack_name: pack_name.to_string(),
                is_compliant: mismatches.is_empty(),
                mismatches: mismatches.clone(),
                checked_at: now,
            };
            (vec![Event::CheckRecorded { record: record.clone() }], record)
        })?;

        tracing::info!(
            server_id = %server_id,
            pack = pack_name,
            compliant = record.is_compliant,
            mismatches = record.mismatches.len(),
            "compliance check recorded"
        );
        Ok(record)
    }

    // -- item executors --

    async fn apply_file(
        &self,
        server: &Server,
        username: &str,
        file: &FileItem,
    ) -> Result<ApplyItemResult, ApplyError> {
        let home = home_dir(username);
        let path = expand_home(&file.path, &home);

        let content = match &file.template {
            Some(template) => match self.loader.template_content(template) {
                Ok(content) => content,
                Err(e) => {
                    return Ok(item_failure(&file.path, "created", &e.to_string()));
                }
            },
            None => String::new(),
        };

        if let Some(parent) = path.rsplit_once('/').map(|(dir, _)| dir).filter(|d| !d.is_empty()) {
            let mkdir = format!("mkdir -p \"{parent}\"");
            self.exec(server, &mkdir, None).await?;
        }

        let create = format!(
            "cat > \"{path}\" << '{HEREDOC_DELIMITER}'\n{content}\n{HEREDOC_DELIMITER}"
        );
        let result = self.exec(server, &create, None).await?;
        if result.exit_code != 0 {
            return Ok(item_failure(
                &file.path,
                "created",
                &fallback(&result.stderr, "Failed to create file"),
            ));
        }

        let chmod = format!("chmod {} \"{path}\"", file.mode);
        let result = self.exec(server, &chmod, None).await?;
        if result.exit_code != 0 {
            return Ok(item_failure(
                &file.path,
                "created",
                &format!("File created but chmod failed: {}", result.stderr),
            ));
        }

        Ok(ApplyItemResult {
            item: file.path.clone(),
            action: "created".to_string(),
            success: true,
            error: None,
        })
    }

    async fn apply_package(
        &self,
        server: &Server,
        package: &PackageItem,
    ) -> Result<ApplyItemResult, ApplyError> {
        let cmd = format!("sudo apt-get install -y {}", package.name);
        let result = self.exec(server, &cmd, Some(PACKAGE_TIMEOUT)).await?;
        if result.exit_code != 0 {
            return Ok(item_failure(
                &package.name,
                "installed",
                &fallback(&result.stderr, "apt-get install failed"),
            ));
        }
        Ok(ApplyItemResult {
            item: package.name.clone(),
            action: "installed".to_string(),
            success: true,
            error: None,
        })
    }

    async fn apply_setting(
        &self,
        server: &Server,
        username: &str,
        setting: &SettingItem,
    ) -> Result<ApplyItemResult, ApplyError> {
        debug_assert_eq!(setting.kind, SettingKind::EnvVar);
        let home = home_dir(username);
        let bashrc_d = format!("{home}/.bashrc.d");
        let env_file = format!("{bashrc_d}/env.sh");
        let item = format!("env:{}", setting.key);

        self.exec(server, &format!("mkdir -p \"{bashrc_d}\""), None).await?;

        let escaped = setting.expected.replace('"', "\\\"");
        let append =
            format!("echo 'export {}=\"{escaped}\"' >> \"{env_file}\"", setting.key);
        let result = self.exec(server, &append, None).await?;
        if result.exit_code != 0 {
            return Ok(item_failure(
                &item,
                "set",
                &fallback(&result.stderr, "Failed to set environment variable"),
            ));
        }

        Ok(ApplyItemResult { item, action: "set".to_string(), success: true, error: None })
    }

    async fn remove_file(
        &self,
        server: &Server,
        username: &str,
        file: &FileItem,
    ) -> Result<RemoveItemResult, ApplyError> {
        let home = home_dir(username);
        let path = expand_home(&file.path, &home);
        let backup_path = format!("{path}{BACKUP_SUFFIX}");

        let check = format!("test -f \"{path}\" && echo exists || echo missing");
        let result = self.exec(server, &check, None).await?;
        if result.stdout.contains("missing") {
            return Ok(RemoveItemResult {
                item: file.path.clone(),
                item_type: "file".to_string(),
                action: "deleted".to_string(),
                success: true,
                backup_path: None,
                note: Some("File already removed or never existed".to_string()),
                error: None,
            });
        }

        // Backup failure is tolerated; deletion still proceeds.
        let backup = format!("cp \"{path}\" \"{backup_path}\" 2>/dev/null || true");
        self.exec(server, &backup, None).await?;

        let delete = format!("rm -f \"{path}\"");
        let result = self.exec(server, &delete, None).await?;
        if result.exit_code != 0 {
            return Ok(RemoveItemResult {
                item: file.path.clone(),
                item_type: "file".to_string(),
                action: "failed".to_string(),
                success: false,
                backup_path: None,
                note: None,
                error: Some(fallback(&result.stderr, "Failed to delete file")),
            });
        }

        Ok(RemoveItemResult {
            item: file.path.clone(),
            item_type: "file".to_string(),
            action: "deleted".to_string(),
            success: true,
            backup_path: Some(backup_path.clone()),
            note: Some(format!("Backup saved to {backup_path}")),
            error: None,
        })
    }

    async fn remove_setting(
        &self,
        server: &Server,
        username: &str,
        setting: &SettingItem,
    ) -> Result<RemoveItemResult, ApplyError> {
        debug_assert_eq!(setting.kind, SettingKind::EnvVar);
        let home = home_dir(username);
        let env_file = format!("{home}/.bashrc.d/env.sh");

        let check = format!("test -f \"{env_file}\" && echo exists || echo missing");
        let result = self.exec(server, &check, None).await?;
        if result.stdout.contains("missing") {
            return Ok(RemoveItemResult {
                item: setting.key.clone(),
                item_type: "setting".to_string(),
                action: "removed".to_string(),
                success: true,
                backup_path: None,
                note: Some("Shell config file does not exist".to_string()),
                error: None,
            });
        }

        let escaped_key = setting.key.replace('/', "\\/");
        let sed = format!("sed -i '/^export {escaped_key}=/d' \"{env_file}\"");
        let result = self.exec(server, &sed, None).await?;
        if result.exit_code != 0 {
            return Ok(RemoveItemResult {
                item: setting.key.clone(),
                item_type: "setting".to_string(),
                action: "failed".to_string(),
                success: false,
                backup_path: None,
                note: None,
                error: Some(fallback(&result.stderr, "Failed to remove setting")),
            });
        }

        Ok(RemoveItemResult {
            item: setting.key.clone(),
            item_type: "setting".to_string(),
            action: "removed".to_string(),
            success: true,
            backup_path: None,
            note: Some(format!("Removed from {env_file}")),
            error: None,
        })
    }

    // -- helpers --

    async fn exec(
        &self,
        server: &Server,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<hlh_ssh::CommandResult, ApplyError> {
        self.executor
            .execute(server, command, timeout)
            .await
            .map_err(|e: SshError| ApplyError::SshUnavailable(e.to_string()))
    }

    fn progress(
        &self,
        apply_id: u64,
        current_item: Option<String>,
        results: &[ApplyItemResult],
        completed: usize,
        failed: usize,
        total: usize,
    ) -> Result<(), ApplyError> {
        let processed = completed + failed;
        let progress = ((processed * 100) / total).min(100) as u8;
        self.store.commit(|_| {
            (
                vec![Event::ApplyProgress {
                    id: apply_id,
                    current_item,
                    progress,
                    items_completed: completed,
                    items_failed: failed,
                    results: results.to_vec(),
                }],
                (),
            )
        })?;
        Ok(())
    }

    async fn fail_apply(&self, apply_id: u64, message: &str) -> Result<(), ApplyError> {
        let now: DateTime<Utc> = self.clock.now();
        tracing::error!(apply_id, error = message, "config apply failed");
        self.store.commit(|_| {
            (vec![Event::ApplyFailed { id: apply_id, at: now, error: message.to_string() }], ())
        })?;
        Ok(())
    }

    fn require_server(&self, server_id: &ServerId) -> Result<Server, ApplyError> {
        self.store
            .read(|s| s.server(server_id).cloned())
            .ok_or_else(|| ApplyError::ServerNotFound(server_id.clone()))
    }
}

fn home_dir(username: &str) -> String {
    if username == "root" {
        "/root".to_string()
    } else {
        format!("/home/{username}")
    }
}

fn expand_home(path: &str, home: &str) -> String {
    path.replace('~', home)
}

fn fallback(stderr: &str, default: &str) -> String {
    if stderr.trim().is_empty() {
        default.to_string()
    } else {
        stderr.to_string()
    }
}

fn item_failure(item: &str, action: &str, error: &str) -> ApplyItemResult {
    ApplyItemResult {
        item: item.to_string(),
        action: action.to_string(),
        success: false,
        error: Some(error.to_string()),
    }
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod tests;
