pub mod message_relay;
pub mod router;

pub use message_relay::MessageRelay;
pub use router::{RoomKey, RoomRouter};
