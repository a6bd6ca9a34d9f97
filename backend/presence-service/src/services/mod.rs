pub mod dispatcher;
pub mod fanout;
pub mod retention;

pub use dispatcher::NotificationDispatcher;
pub use fanout::{BusinessEvent, EventFanout, FannedOut};
pub use retention::spawn_retention_sweeper;
