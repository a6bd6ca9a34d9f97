//! Presence: which live connection currently represents each user.
//!
//! - `registry`: the user -> connection map with replace-on-reconnect semantics
//! - `lifecycle`: transport event handling, the registry's only writer

pub mod lifecycle;
pub mod registry;

pub use lifecycle::{ConnectionHandle, PresenceManager};
pub use registry::{Connection, ConnectionId, ConnectionRegistry, Presence, PushSender, Removal};
