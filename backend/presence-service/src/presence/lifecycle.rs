/// Presence Lifecycle Manager
///
/// Reacts to connect / add-user / remove-user / disconnect transport events and
/// is the only component allowed to mutate the `ConnectionRegistry`.
use super::registry::{ConnectionId, ConnectionRegistry, Presence, PushSender, Removal};
use crate::metrics;
use crate::models::UserId;
use crate::websocket::ServerEvent;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-connection presence state, owned by the transport session
#[derive(Debug)]
pub struct ConnectionHandle {
    connection_id: ConnectionId,
    sender: PushSender,
    user_id: Option<UserId>,
    connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// User announced on this connection, if any
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}

#[derive(Clone, Default)]
pub struct PresenceManager {
    registry: ConnectionRegistry,
}

impl PresenceManager {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Query view handed to the router, dispatcher and HTTP handlers
    pub fn view(&self) -> Arc<dyn Presence> {
        Arc::new(self.registry.clone())
    }

    pub fn on_connect(&self, sender: PushSender) -> ConnectionHandle {
        let handle = ConnectionHandle {
            connection_id: ConnectionId::new(),
            sender,
            user_id: None,
            connected_at: Utc::now(),
        };
        metrics::record_connection_opened();
        debug!(connection_id = %handle.connection_id, "connection opened");
        handle
    }

    /// Bind the connection to `user_id`.
    ///
    /// Announcing a different user on the same connection drops the earlier
    /// binding first. A connection this registration supersedes is told so and
    /// otherwise left to close on its own; its id is returned.
    pub fn on_add_user(
        &self,
        handle: &mut ConnectionHandle,
        user_id: UserId,
    ) -> Option<ConnectionId> {
        if let Some(previous) = handle.user_id.as_ref() {
            if previous != &user_id {
                self.registry.unregister(handle.connection_id);
            }
        }

        let superseded =
            self.registry
                .register(user_id.clone(), handle.connection_id, handle.sender.clone());

        let superseded_id = superseded.as_ref().map(|old| old.connection_id);
        if let Some(old) = superseded {
            metrics::record_supersede();
            let _ = old.sender.send(ServerEvent::Superseded {
                user_id: user_id.clone(),
                connection_id: handle.connection_id,
            });
            info!(
                user_id = %user_id,
                old_connection = %old.connection_id,
                new_connection = %handle.connection_id,
                "user reconnected, previous connection superseded"
            );
        } else {
            info!(user_id = %user_id, connection_id = %handle.connection_id, "user online");
        }

        handle.user_id = Some(user_id);
        superseded_id
    }

    /// Stop representing the announced user; the socket stays open.
    pub fn on_remove_user(&self, handle: &mut ConnectionHandle) -> Removal {
        let removal = self.registry.unregister(handle.connection_id);
        handle.user_id = None;
        log_removal(&removal, handle.connection_id);
        removal
    }

    pub fn on_disconnect(&self, handle: ConnectionHandle) -> Removal {
        let removal = self.registry.unregister(handle.connection_id);
        metrics::record_connection_closed();
        log_removal(&removal, handle.connection_id);
        removal
    }
}

fn log_removal(removal: &Removal, connection_id: ConnectionId) {
    match removal {
        Removal::Removed(user_id) => {
            info!(user_id = %user_id, connection_id = %connection_id, "user offline")
        }
        Removal::Stale(user_id) => debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            "superseded connection closed, newer session kept"
        ),
        Removal::Unknown => debug!(connection_id = %connection_id, "anonymous connection closed"),
    }
}
