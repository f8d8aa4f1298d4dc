// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token, credential and host-key event handlers.

use super::MaterializedState;
use hlh_core::{
    AgentCredential, Credential, CredentialType, Event, HostKey, RegistrationToken, ServerId,
};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::RegistrationTokenMinted { record } => {
            if state.registration_tokens.iter().any(|t| t.id == record.id) {
                return;
            }
            state.next_token_id = state.next_token_id.max(record.id + 1);
            state.registration_tokens.push(record.clone());
        }

        Event::RegistrationTokenClaimed { id, server_id, at } => {
            let Some(token) = state.registration_tokens.iter_mut().find(|t| t.id == *id) else {
                return;
            };
            // Claim is terminal.
            if token.claimed_at.is_none() {
                token.claimed_at = Some(*at);
                token.claimed_by_server_id = Some(server_id.clone());
            }
        }

        Event::AgentCredentialCreated { record } => {
            state.agent_credentials.push(record.clone());
        }

        Event::AgentCredentialRevoked { server_guid, at } => {
            for cred in
                state.agent_credentials.iter_mut().filter(|c| &c.server_guid == server_guid)
            {
                if cred.revoked_at.is_none() {
                    cred.revoked_at = Some(*at);
                }
            }
        }

        Event::AgentCredentialUsed { server_guid, at } => {
            if let Some(cred) = state
                .agent_credentials
                .iter_mut()
                .find(|c| &c.server_guid == server_guid && c.revoked_at.is_none())
            {
                cred.last_used_at = Some(*at);
            }
        }

        Event::CredentialStored { record } => {
            // Upsert by (type, server_id); server_id None is the distinct
            // global row.
            match state.credentials.iter_mut().find(|c| {
                c.credential_type == record.credential_type && c.server_id == record.server_id
            }) {
                Some(existing) => {
                    existing.encrypted_value.clone_from(&record.encrypted_value);
                    existing.updated_at = record.updated_at;
                }
                None => state.credentials.push(record.clone()),
            }
        }

        Event::CredentialDeleted { credential_type, server_id } => {
            state
                .credentials
                .retain(|c| !(c.credential_type == *credential_type && c.server_id == *server_id));
        }

        Event::HostKeyStored { record } => {
            // Exactly one row per machine; storing again replaces it.
            state.host_keys.insert(record.machine_id.clone(), record.clone());
        }

        Event::HostKeySeen { machine_id, at } => {
            if let Some(key) = state.host_keys.get_mut(machine_id) {
                key.last_seen = *at;
            }
        }

        _ => {}
    }
}

impl MaterializedState {
    pub fn registration_token_by_hash(&self, hash: &str) -> Option<&RegistrationToken> {
        self.registration_tokens.iter().find(|t| t.token_hash == hash)
    }

    /// Only the non-revoked credential is authoritative for a GUID.
    pub fn active_agent_credential(&self, guid: &str) -> Option<&AgentCredential> {
        self.agent_credentials
            .iter()
            .find(|c| c.server_guid.as_str() == guid && c.revoked_at.is_none())
    }

    pub fn credential(
        &self,
        credential_type: CredentialType,
        server_id: Option<&ServerId>,
    ) -> Option<&Credential> {
        self.credentials
            .iter()
            .find(|c| c.credential_type == credential_type && c.server_id.as_ref() == server_id)
    }

    pub fn host_key(&self, machine_id: &ServerId) -> Option<&HostKey> {
        self.host_keys.get(machine_id)
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
