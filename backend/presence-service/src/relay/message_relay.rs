/// Message Relay
///
/// Direct, best-effort chat delivery. A message for an offline receiver is
/// dropped; nothing is queued or retried.
use super::router::{RoomKey, RoomRouter};
use crate::metrics;
use crate::models::{ChatMessage, Delivery};
use crate::websocket::ServerEvent;
use tracing::debug;

#[derive(Clone)]
pub struct MessageRelay {
    router: RoomRouter,
}

impl MessageRelay {
    pub fn new(router: RoomRouter) -> Self {
        Self { router }
    }

    pub fn send_direct(&self, message: &ChatMessage) -> Delivery {
        let room = RoomKey::for_user(&message.receiver_id);
        let delivered = self.router.push(
            &room,
            ServerEvent::GetMessage {
                message: message.clone(),
            },
        );

        metrics::record_delivery("chat", delivered);
        debug!(
            message_id = %message.id,
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            delivered,
            "direct message relayed"
        );

        if delivered {
            Delivery::delivered()
        } else {
            Delivery::missed()
        }
    }
}
