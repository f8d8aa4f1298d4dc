// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server event handlers and the delete cascade.

use super::MaterializedState;
use hlh_core::{Event, MachineGuid, Server, ServerId, ServerStatus, ServiceStatus};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::ServerRegistered { id, guid, hostname, display_name, at } => {
            // Idempotency: re-registering an existing id keeps the record.
            if state.servers.contains_key(id) {
                return;
            }
            let mut server = Server::new(id.clone(), guid.clone(), *at);
            server.hostname.clone_from(hostname);
            server.display_name.clone_from(display_name);
            state.servers.insert(id.clone(), server);
        }

        Event::ServerInfoUpdated {
            id,
            os_info,
            cpu_info,
            agent_version,
            agent_mode,
            reboot_required,
            category,
        } => {
            let Some(server) = state.servers.get_mut(id) else { return };
            if let Some(os) = os_info {
                if os.distribution.is_some() {
                    server.os_distribution.clone_from(&os.distribution);
                }
                if os.version.is_some() {
                    server.os_version.clone_from(&os.version);
                }
                if os.kernel.is_some() {
                    server.kernel_version.clone_from(&os.kernel);
                }
                if os.architecture.is_some() {
                    server.architecture.clone_from(&os.architecture);
                }
            }
            if let Some(cpu) = cpu_info {
                if cpu.cpu_model.is_some() {
                    server.cpu_model.clone_from(&cpu.cpu_model);
                }
                if cpu.cpu_cores.is_some() {
                    server.cpu_cores = cpu.cpu_cores;
                }
            }
            if agent_version.is_some() {
                server.agent_version.clone_from(agent_version);
            }
            if let Some(mode) = agent_mode {
                server.agent_mode = *mode;
            }
            if reboot_required.is_some() {
                server.reboot_required = *reboot_required;
            }
            if let Some((cat, source)) = category {
                server.machine_category = Some(*cat);
                server.machine_category_source = Some(*source);
            }
        }

        Event::ServerHeartbeat { id, at, metrics, updates_available, security_updates } => {
            let Some(server) = state.servers.get_mut(id) else { return };
            server.last_seen = Some(*at);
            server.status = ServerStatus::Online;
            server.latest_metrics = Some(metrics.clone());
            if updates_available.is_some() {
                server.updates_available = *updates_available;
            }
            if security_updates.is_some() {
                server.security_updates = *security_updates;
            }
        }

        Event::ServerServicesReported { id, services, at } => {
            let statuses = state.service_statuses.entry(id.clone()).or_default();
            for report in services {
                match statuses.iter_mut().find(|s| s.name == report.name) {
                    Some(existing) => {
                        existing.status = report.status;
                        existing.pid = report.pid;
                        existing.memory_mb = report.memory_mb;
                        existing.cpu_percent = report.cpu_percent;
                        existing.reported_at = *at;
                    }
                    None => statuses.push(ServiceStatus {
                        name: report.name.clone(),
                        status: report.status,
                        pid: report.pid,
                        memory_mb: report.memory_mb,
                        cpu_percent: report.cpu_percent,
                        reported_at: *at,
                    }),
                }
            }
        }

        Event::ServerPackagesReported { id, packages } => {
            // Replaced wholesale by the reported set.
            let pending = state.pending_packages.entry(id.clone()).or_default();
            pending.clear();
            pending.extend(packages.iter().map(|p| hlh_core::PendingPackage {
                name: p.name.clone(),
                current_version: p.current_version.clone(),
                new_version: p.new_version.clone(),
                repository: p.repository.clone(),
                is_security: p.is_security,
            }));
        }

        Event::ServerMarkedOffline { id, .. } => {
            if let Some(server) = state.servers.get_mut(id) {
                server.status = ServerStatus::Offline;
            }
        }

        Event::ServerPaused { id, paused, at } => {
            if let Some(server) = state.servers.get_mut(id) {
                server.is_paused = *paused;
                server.paused_at = paused.then_some(*at);
            }
        }

        Event::ServerDeactivated { id, at } => {
            if let Some(server) = state.servers.get_mut(id) {
                server.is_inactive = true;
                server.inactive_since = Some(*at);
                server.status = ServerStatus::Offline;
            }
        }

        Event::ServerReactivated { id } => {
            if let Some(server) = state.servers.get_mut(id) {
                server.is_inactive = false;
                server.inactive_since = None;
            }
        }

        Event::ServerGuidRotated { id, guid } => {
            if let Some(server) = state.servers.get_mut(id) {
                server.guid = guid.clone();
            }
        }

        Event::ServerPacksAssigned { id, packs, drift_detection } => {
            if let Some(server) = state.servers.get_mut(id) {
                server.assigned_packs.clone_from(packs);
                server.drift_detection_enabled = *drift_detection;
            }
        }

        Event::ExpectedServiceAdded { service } => {
            let services = state.expected_services.entry(service.server_id.clone()).or_default();
            if !services.iter().any(|s| s.service_name == service.service_name) {
                services.push(service.clone());
            }
        }

        Event::ServerDeleted { id } => {
            delete_cascade(state, id);
        }

        _ => {}
    }
}

/// Server is the aggregate root: deleting it removes every piece of
/// per-machine state, including the per-server credentials and host key.
fn delete_cascade(state: &mut MaterializedState, id: &ServerId) {
    let guid: Option<MachineGuid> = state.servers.remove(id).map(|s| s.guid);
    state.alerts.retain(|a| &a.server_id != id);
    state.actions.retain(|a| &a.server_id != id);
    state.expected_services.remove(id);
    state.service_statuses.remove(id);
    state.pending_packages.remove(id);
    state.config_applies.retain(|a| &a.server_id != id);
    state.config_checks.retain(|c| &c.server_id != id);
    state.credentials.retain(|c| c.server_id.as_ref() != Some(id));
    state.host_keys.remove(id);
    state.alert_states.retain(|(server, _), _| server != id);
    if let Some(guid) = guid {
        state.agent_credentials.retain(|c| c.server_guid != guid);
    }
}

impl MaterializedState {
    /// Servers eligible for offline detection: active, previously seen.
    pub fn stale_servers(
        &self,
        now: chrono::DateTime<chrono::Utc>,
        offline_seconds: u32,
    ) -> Vec<ServerId> {
        self.servers
            .values()
            .filter(|s| !s.is_inactive)
            .filter(|s| s.status != ServerStatus::Offline)
            .filter(|s| s.is_stale(now, offline_seconds))
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn expected_services_for(&self, id: &ServerId) -> &[hlh_core::ExpectedService] {
        self.expected_services.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pending_security_packages(&self, id: &ServerId) -> Vec<String> {
        self.pending_packages
            .get(id)
            .map(|pkgs| {
                pkgs.iter().filter(|p| p.is_security).map(|p| p.name.clone()).collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "servers_tests.rs"]
mod tests;
