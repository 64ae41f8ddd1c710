//! Participant id → open channel bookkeeping.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::store::participants::Role;

use super::protocol::ServerMessage;

/// Close code sent to a channel superseded by a newer connection.
pub const CLOSE_REPLACED: u16 = 4000;

/// What a connection's writer task is asked to put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Frame(ServerMessage),
    Close { code: u16, reason: &'static str },
}

#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: Uuid,
    pub role: Role,
    pub sender: mpsc::Sender<Outgoing>,
}

impl ConnectionHandle {
    pub fn new(role: Role, sender: mpsc::Sender<Outgoing>) -> Self {
        ConnectionHandle {
            connection_id: Uuid::now_v7(),
            role,
            sender,
        }
    }

    /// Queues without waiting. A full or closed queue drops the frame.
    pub fn send(&self, participant_id: &str, outgoing: Outgoing) -> bool {
        match self.sender.try_send(outgoing) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    participant_id,
                    connection_id = %self.connection_id,
                    error = %e,
                    "dropped outbound frame"
                );
                false
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    connections: RwLock<HashMap<String, ConnectionHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the handle, asking any handle it replaces to close.
    pub async fn register(&self, participant_id: &str, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let connection_id = handle.connection_id;
        let replaced = self
            .connections
            .write()
            .await
            .insert(participant_id.to_owned(), handle);

        if let Some(stale) = &replaced {
            tracing::info!(participant_id, connection_id = %stale.connection_id, "replacing stale connection");
            stale.send(participant_id, Outgoing::Close { code: CLOSE_REPLACED, reason: "replaced" });
        }
        tracing::debug!(participant_id, %connection_id, "connection registered");
        replaced
    }

    pub async fn unregister(&self, participant_id: &str) -> Option<ConnectionHandle> {
        let removed = self.connections.write().await.remove(participant_id);
        if removed.is_some() {
            tracing::debug!(participant_id, "connection unregistered");
        }
        removed
    }

    /// Removes the entry only while it still belongs to `connection_id`.
    pub async fn release(&self, participant_id: &str, connection_id: Uuid) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get(participant_id) {
            Some(handle) if handle.connection_id == connection_id => {
                connections.remove(participant_id);
                tracing::debug!(participant_id, %connection_id, "connection released");
                true
            }
            _ => false,
        }
    }

    /// Unregisters and asks the channel to close.
    pub async fn disconnect(&self, participant_id: &str, code: u16, reason: &'static str) -> bool {
        match self.unregister(participant_id).await {
            Some(handle) => handle.send(participant_id, Outgoing::Close { code, reason }),
            None => false,
        }
    }

    pub async fn lookup(&self, participant_id: &str) -> Option<ConnectionHandle> {
        self.connections.read().await.get(participant_id).cloned()
    }

    pub async fn participant_ids(&self) -> Vec<String> {
        self.connections.read().await.keys().cloned().collect()
    }

    /// Copy of every live entry, so callers never iterate under the lock.
    pub async fn snapshot(&self) -> Vec<(String, ConnectionHandle)> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect()
    }

    pub async fn set_role(&self, participant_id: &str, connection_id: Uuid, role: Role) {
        let mut connections = self.connections.write().await;
        if let Some(handle) = connections.get_mut(participant_id) {
            if handle.connection_id == connection_id && handle.role != role {
                tracing::info!(participant_id, from = ?handle.role, to = ?role, "role changed");
                handle.role = role;
            }
        }
    }
}
