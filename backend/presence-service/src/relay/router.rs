/// Room Router
///
/// A room is the address of one user's live connection. It is derived from the
/// user id and exists only while the registry holds a connection for that user.
use crate::models::UserId;
use crate::presence::{ConnectionId, Presence};
use crate::websocket::ServerEvent;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomKey(UserId);

impl RoomKey {
    pub fn for_user(user_id: &UserId) -> Self {
        Self(user_id.clone())
    }

    pub fn user_id(&self) -> &UserId {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

#[derive(Clone)]
pub struct RoomRouter {
    presence: Arc<dyn Presence>,
}

impl RoomRouter {
    pub fn new(presence: Arc<dyn Presence>) -> Self {
        Self { presence }
    }

    pub fn presence(&self) -> &Arc<dyn Presence> {
        &self.presence
    }

    /// Confirm `connection_id` currently represents `user_id` and return the
    /// user's room. Calling it again for the same pair returns the same room.
    pub fn join(&self, user_id: &UserId, connection_id: ConnectionId) -> Option<RoomKey> {
        match self.presence.lookup(user_id) {
            Some(current) if current == connection_id => Some(RoomKey::for_user(user_id)),
            _ => None,
        }
    }

    /// Send `event` to whoever currently holds `room`.
    ///
    /// Returns false when the room is empty or the connection's channel is
    /// already closed. Never waits for the client.
    pub fn push(&self, room: &RoomKey, event: ServerEvent) -> bool {
        let Some(connection) = self.presence.route(room.user_id()) else {
            return false;
        };

        match connection.sender.send(event) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(
                    room = %room,
                    connection_id = %connection.connection_id,
                    "push to closed connection dropped"
                );
                false
            }
        }
    }

    pub fn push_to_user(&self, user_id: &UserId, event: ServerEvent) -> bool {
        self.push(&RoomKey::for_user(user_id), event)
    }
}
