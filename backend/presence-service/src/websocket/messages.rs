/// WebSocket frames exchanged with clients
use crate::models::{ChatMessage, Notification, UserId};
use crate::presence::ConnectionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Inbound events from client to server.
///
/// Ids are kept as raw JSON values here and normalized by the session so a
/// malformed id yields a precise validation error instead of a parse failure.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Client announces which user this connection represents
    #[serde(rename_all = "camelCase")]
    AddUser {
        #[serde(default)]
        user_id: Value,
    },

    /// Direct chat message to another user.
    ///
    /// Accepts both `sender`/`receiver` and `senderId`/`receiverId`.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        #[serde(default, alias = "sender")]
        sender_id: Option<Value>,
        #[serde(default, alias = "receiver")]
        receiver_id: Value,
        #[serde(default)]
        text: String,
        #[serde(default)]
        property_id: Option<String>,
        #[serde(default)]
        property_title: Option<String>,
    },

    /// Client stops representing its user without closing the socket
    RemoveUser,

    /// Application-level keepalive
    Ping {
        #[serde(default)]
        timestamp: i64,
    },
}

/// Outbound events from server to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Socket accepted
    #[serde(rename_all = "camelCase")]
    Connected {
        connection_id: ConnectionId,
        timestamp: i64,
    },

    /// Connection bound to the user's personal room
    #[serde(rename_all = "camelCase")]
    Joined {
        user_id: UserId,
        connection_id: ConnectionId,
    },

    /// A newer connection took over this user's room
    #[serde(rename_all = "camelCase")]
    Superseded {
        user_id: UserId,
        connection_id: ConnectionId,
    },

    /// Incoming direct chat message
    GetMessage { message: ChatMessage },

    /// Acknowledgement to the sender of a chat message
    #[serde(rename_all = "camelCase")]
    MessageStatus { message_id: Uuid, delivered: bool },

    /// Real-time copy of a freshly persisted notification
    Notification { notification: Notification },

    /// Refreshed unread total after a read-state change
    UnreadCount { count: u64 },

    Pong { timestamp: i64 },

    Error { code: String, message: String },
}

impl ServerEvent {
    pub fn connected(connection_id: ConnectionId) -> Self {
        ServerEvent::Connected {
            connection_id,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
