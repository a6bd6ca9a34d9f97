/// Connection Registry
///
/// Maps a normalized user id to the single connection that currently
/// represents it. A later registration for the same user replaces the earlier
/// one without waiting for its teardown; removal is keyed by connection id so a
/// late disconnect from a superseded socket cannot evict the live one.
use crate::metrics;
use crate::models::UserId;
use crate::websocket::ServerEvent;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound channel of one WebSocket connection
pub type PushSender = mpsc::UnboundedSender<ServerEvent>;

/// Unique identifier of one physical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Live connection bound to a user
#[derive(Debug, Clone)]
pub struct Connection {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub connected_at: DateTime<Utc>,
    pub sender: PushSender,
}

/// Result of `unregister`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// The connection was the user's current one and has been removed
    Removed(UserId),
    /// The connection had already been superseded; the user's entry is untouched
    Stale(UserId),
    /// The connection was never registered or is already gone
    Unknown,
}

/// Read-only presence queries.
///
/// Everything outside the presence layer depends on this trait rather than on
/// the registry itself, so only `PresenceManager` can mutate registrations.
pub trait Presence: Send + Sync {
    fn lookup(&self, user_id: &UserId) -> Option<ConnectionId>;

    fn route(&self, user_id: &UserId) -> Option<Connection>;

    fn online_users(&self) -> Vec<UserId>;

    fn is_online(&self, user_id: &UserId) -> bool {
        self.lookup(user_id).is_some()
    }
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    // user_id -> current connection
    by_user: Arc<DashMap<UserId, Connection>>,
    // connection_id -> user_id, for removal without scanning
    by_connection: Arc<DashMap<ConnectionId, UserId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `connection_id` to `user_id`, replacing any previous binding.
    ///
    /// Returns the superseded connection, if a different one was registered.
    /// Re-registering the same pair is a no-op apart from refreshing the sender.
    pub fn register(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        sender: PushSender,
    ) -> Option<Connection> {
        let connection = Connection {
            user_id: user_id.clone(),
            connection_id,
            connected_at: Utc::now(),
            sender,
        };

        self.by_connection.insert(connection_id, user_id.clone());
        let previous = self.by_user.insert(user_id.clone(), connection);
        metrics::set_online_users(self.by_user.len());

        match previous {
            Some(prev) if prev.connection_id != connection_id => {
                // The superseded id stays indexed until its own disconnect
                // arrives, which then resolves to `Removal::Stale`.
                tracing::debug!(
                    user_id = %user_id,
                    old_connection = %prev.connection_id,
                    new_connection = %connection_id,
                    "connection superseded"
                );
                Some(prev)
            }
            _ => None,
        }
    }

    /// Remove the registration held by `connection_id`, but only while it is
    /// still the user's current connection.
    pub fn unregister(&self, connection_id: ConnectionId) -> Removal {
        let Some((_, user_id)) = self.by_connection.remove(&connection_id) else {
            return Removal::Unknown;
        };

        let removed = self
            .by_user
            .remove_if(&user_id, |_, current| current.connection_id == connection_id);
        metrics::set_online_users(self.by_user.len());

        if removed.is_some() {
            Removal::Removed(user_id)
        } else {
            tracing::debug!(
                user_id = %user_id,
                connection_id = %connection_id,
                "ignoring unregister for superseded connection"
            );
            metrics::record_stale_unregister();
            Removal::Stale(user_id)
        }
    }

    pub fn online_count(&self) -> usize {
        self.by_user.len()
    }
}

impl Presence for ConnectionRegistry {
    fn lookup(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.by_user.get(user_id).map(|entry| entry.connection_id)
    }

    fn route(&self, user_id: &UserId) -> Option<Connection> {
        self.by_user.get(user_id).map(|entry| entry.value().clone())
    }

    fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.by_user.iter().map(|e| e.key().clone()).collect();
        users.sort();
        users
    }
}
