// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The remediation action queue.
//!
//! Admission turns a named operation into exactly one vetted command via
//! the whitelist; the maintenance gate decides between auto-approval and
//! operator approval; dispatch runs in a background task and reports by
//! mutating the action record, never by panicking.

use hlh_core::{
    build_command, build_security_upgrade_command, ActionStatus, ActionType, Clock,
    CommandSpecError, Event, HubConfig, RemediationAction, ServerId,
};
use hlh_notify::{ActionEvent, Notifier};
use hlh_ssh::{SshConnector, SshExecutor};
use hlh_storage::{HubStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Apt operations run with a long leash.
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Server '{0}' not found")]
    ServerNotFound(ServerId),
    #[error("Action {0} not found")]
    ActionNotFound(u64),
    #[error("{0}")]
    Conflict(String),
    #[error("Action type '{0}' not in whitelist")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ActionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ServerNotFound(_) | Self::ActionNotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Store(_) => "INTERNAL",
        }
    }
}

impl From<CommandSpecError> for ActionError {
    fn from(e: CommandSpecError) -> Self {
        Self::Validation(e.to_string())
    }
}

/// What a dashboard client may ask for.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub server_id: ServerId,
    pub action_type: ActionType,
    pub service_name: Option<String>,
    pub alert_id: Option<u64>,
}

/// Admission, approval and dispatch of remediation actions.
pub struct ActionQueue<C: Clock, Conn: SshConnector> {
    store: HubStore,
    executor: Arc<SshExecutor<C, Conn>>,
    notifier: Arc<dyn Notifier>,
    config: HubConfig,
    clock: C,
}

impl<C: Clock, Conn: SshConnector> ActionQueue<C, Conn> {
    pub fn new(
        store: HubStore,
        executor: Arc<SshExecutor<C, Conn>>,
        notifier: Arc<dyn Notifier>,
        config: HubConfig,
        clock: C,
    ) -> Self {
        Self { store, executor, notifier, config, clock }
    }

    /// Admit a new action. Paused servers queue for approval; everything
    /// else is auto-approved (the caller dispatches those).
    pub fn create_action(&self, request: &ActionRequest) -> Result<RemediationAction, ActionError> {
        let now = self.clock.now();
        let outcome = self.store.commit(|state| {
            let Some(server) = state.server(&request.server_id) else {
                return (vec![], Err(ActionError::ServerNotFound(request.server_id.clone())));
            };
            if server.is_inactive {
                return (
                    vec![],
                    Err(ActionError::Conflict(format!(
                        "Cannot create actions for inactive server '{}' (agent removed)",
                        request.server_id
                    ))),
                );
            }
            if server.agent_mode == hlh_core::AgentMode::Readonly {
                return (
                    vec![],
                    Err(ActionError::Conflict(format!(
                        "Cannot create actions for server '{}' (agent is in readonly mode). \
                         Reinstall agent with --mode readwrite to enable management.",
                        request.server_id
                    ))),
                );
            }

            // The command is always the hub's own construction.
            let command = match request.action_type {
                ActionType::RestartService => {
                    let Some(service) = request.service_name.as_deref() else {
                        return (
                            vec![],
                            Err(ActionError::Validation(
                                "service_name is required for restart_service actions".to_string(),
                            )),
                        );
                    };
                    match build_command(ActionType::RestartService, Some(service)) {
                        Ok(command) => command,
                        Err(e) => return (vec![], Err(e.into())),
                    }
                }
                ActionType::AptUpgradeSecurity => {
                    let packages = state.pending_security_packages(&request.server_id);
                    match build_security_upgrade_command(&packages) {
                        Ok(command) => command,
                        Err(e) => return (vec![], Err(e.into())),
                    }
                }
                other => match build_command(other, None) {
                    Ok(command) => command,
                    Err(e) => return (vec![], Err(e.into())),
                },
            };

            // Duplicate suppression.
            if request.action_type == ActionType::RestartService {
                if let Some(service) = request.service_name.as_deref() {
                    if state.pending_restart(&request.server_id, service).is_some() {
                        return (
                            vec![],
                            Err(ActionError::Conflict(format!(
                                "Pending action already exists for service '{service}' on \
                                 server '{}'",
                                request.server_id
                            ))),
                        );
                    }
                }
            }
            if request.action_type.is_apt()
                && state.in_flight_apt_action(&request.server_id).is_some()
            {
                return (
                    vec![],
                    Err(ActionError::Conflict(format!(
                        "An APT action is already pending/in-progress for server '{}'",
                        request.server_id
                    ))),
                );
            }

            // Maintenance gate.
            let paused = server.is_paused;
            let mut record = RemediationAction {
                id: state.allocate_action_id(),
                server_id: request.server_id.clone(),
                action_type: request.action_type,
                service_name: request.service_name.clone(),
                command,
                alert_id: request.alert_id,
                status: if paused { ActionStatus::Pending } else { ActionStatus::Approved },
                created_by: "dashboard".to_string(),
                created_at: now,
                approved_at: None,
                approved_by: None,
                rejected_at: None,
                rejected_by: None,
                rejection_reason: None,
                executed_at: None,
                completed_at: None,
                exit_code: None,
                stdout: None,
                stderr: None,
            };
            if !paused {
                record.approved_at = Some(now);
                record.approved_by = Some("auto".to_string());
            }

            tracing::info!(
                action_id = record.id,
                server_id = %record.server_id,
                action_type = %record.action_type,
                status = record.status.as_str(),
                "action created"
            );
            (vec![Event::ActionCreated { record: record.clone() }], Ok(record))
        })?;
        outcome
    }

    /// Approve a pending action; only `pending` qualifies.
    pub fn approve(&self, action_id: u64) -> Result<RemediationAction, ActionError> {
        let now = self.clock.now();
        let outcome = self.store.commit(|state| {
            let Some(action) = state.action(action_id) else {
                return (vec![], Err(ActionError::ActionNotFound(action_id)));
            };
            if action.status != ActionStatus::Pending {
                return (
                    vec![],
                    Err(ActionError::Conflict(format!(
                        "Cannot approve action with status '{}' (must be pending)",
                        action.status.as_str()
                    ))),
                );
            }
            (
                vec![Event::ActionApproved { id: action_id, by: "dashboard".to_string(), at: now }],
                Ok(()),
            )
        })?;
        outcome?;
        self.store
            .read(|s| s.action(action_id).cloned())
            .ok_or(ActionError::ActionNotFound(action_id))
    }

    /// Reject a pending action with a reason.
    pub fn reject(&self, action_id: u64, reason: &str) -> Result<RemediationAction, ActionError> {
        if reason.trim().is_empty() {
            return Err(ActionError::Validation("rejection reason is required".to_string()));
        }
        let now = self.clock.now();
        let outcome = self.store.commit(|state| {
            let Some(action) = state.action(action_id) else {
                return (vec![], Err(ActionError::ActionNotFound(action_id)));
            };
            if action.status != ActionStatus::Pending {
                return (
                    vec![],
                    Err(ActionError::Conflict(format!(
                        "Cannot reject action with status '{}' (must be pending)",
                        action.status.as_str()
                    ))),
                );
            }
            (
                vec![Event::ActionRejected {
                    id: action_id,
                    by: "dashboard".to_string(),
                    reason: reason.to_string(),
                    at: now,
                }],
                Ok(()),
            )
        })?;
        outcome?;
        self.store
            .read(|s| s.action(action_id).cloned())
            .ok_or(ActionError::ActionNotFound(action_id))
    }

    /// Cancel an action that has not started executing.
    pub fn cancel(&self, action_id: u64) -> Result<RemediationAction, ActionError> {
        let now = self.clock.now();
        let outcome = self.store.commit(|state| {
            let Some(action) = state.action(action_id) else {
                return (vec![], Err(ActionError::ActionNotFound(action_id)));
            };
            if !matches!(action.status, ActionStatus::Pending | ActionStatus::Approved) {
                return (
                    vec![],
                    Err(ActionError::Conflict(format!(
                        "Cannot cancel action with status '{}' (must be pending or approved)",
                        action.status.as_str()
                    ))),
                );
            }
            (vec![Event::ActionCancelled { id: action_id, at: now }], Ok(()))
        })?;
        outcome?;
        self.store
            .read(|s| s.action(action_id).cloned())
            .ok_or(ActionError::ActionNotFound(action_id))
    }

    /// Kick off background dispatch of an approved action.
    pub fn spawn_dispatch(queue: &Arc<Self>, action_id: u64) {
        let queue = Arc::clone(queue);
        tokio::spawn(async move {
            queue.execute_action(action_id).await;
        });
    }

    /// The dispatch body. Failures mutate the record; nothing escapes.
    pub async fn execute_action(&self, action_id: u64) {
        let now = self.clock.now();
        let Some(action) = self.store.read(|s| s.action(action_id).cloned()) else {
            tracing::error!(action_id, "action not found for execution");
            return;
        };
        // A cancellation may have landed before this task ran.
        if action.status != ActionStatus::Approved {
            tracing::warn!(
                action_id,
                status = action.status.as_str(),
                "action no longer approved, skipping dispatch"
            );
            return;
        }

        let Some(server) = self.store.read(|s| s.server(&action.server_id).cloned()) else {
            let message = format!("Server {} not found", action.server_id);
            let _ = self.store.commit(|_| {
                (
                    vec![Event::ActionFinished {
                        id: action_id,
                        status: ActionStatus::Failed,
                        exit_code: Some(-1),
                        stdout: None,
                        stderr: Some(message),
                        at: now,
                    }],
                    (),
                )
            });
            return;
        };

        if let Err(e) = self
            .store
            .commit(|_| (vec![Event::ActionStarted { id: action_id, at: now }], ()))
        {
            tracing::error!(action_id, error = %e, "failed to mark action executing");
            return;
        }

        // Apt needs root on the target.
        let command = if action.command.contains("apt-get") || action.command.contains("apt ") {
            format!("sudo {}", action.command)
        } else {
            action.command.clone()
        };

        let (status, exit_code, stdout, stderr) =
            match self.executor.execute(&server, &command, Some(DISPATCH_TIMEOUT)).await {
                Ok(result) => {
                    let status = if result.exit_code == 0 {
                        ActionStatus::Completed
                    } else {
                        ActionStatus::Failed
                    };
                    (status, Some(result.exit_code), Some(result.stdout), Some(result.stderr))
                }
                Err(e) => {
                    tracing::error!(action_id, error = %e, "action execution failed");
                    (ActionStatus::Failed, Some(-1), None, Some(e.to_string()))
                }
            };

        let finished_at = self.clock.now();
        if let Err(e) = self.store.commit(|_| {
            (
                vec![Event::ActionFinished {
                    id: action_id,
                    status,
                    exit_code,
                    stdout: stdout.clone(),
                    stderr: stderr.clone(),
                    at: finished_at,
                }],
                (),
            )
        }) {
            tracing::error!(action_id, error = %e, "failed to record action result");
            return;
        }

        tracing::info!(
            action_id,
            status = status.as_str(),
            exit_code,
            "action finished"
        );

        let event = ActionEvent {
            action_id,
            server_id: server.id.clone(),
            server_name: server.name().to_string(),
            action_type: action.action_type,
            service_name: action.service_name.clone(),
            is_success: status == ActionStatus::Completed,
            exit_code,
            stderr,
        };
        self.notifier.send_action(&event, &self.config.notifications).await;
    }
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;
