pub mod messages;
pub mod session;

pub use messages::{ClientEvent, ServerEvent};
pub use session::{ws_index, SessionCore, WsSession};
