/// WebSocket session
///
/// One actor per socket. Protocol handling lives in `SessionCore` so it can be
/// exercised without a running actor system; `WsSession` adds the heartbeat,
/// the outbound push stream and the actor lifecycle.
use super::messages::{ClientEvent, ServerEvent};
use crate::config::WebSocketConfig;
use crate::error::{AppError, AppResult};
use crate::models::{ChatMessage, PropertyContext, UserId};
use crate::presence::{ConnectionHandle, PresenceManager, Removal};
use crate::relay::{MessageRelay, RoomKey};
use crate::state::AppState;
use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Per-connection protocol state machine
pub struct SessionCore {
    handle: Option<ConnectionHandle>,
    presence: PresenceManager,
    relay: MessageRelay,
}

impl SessionCore {
    /// Open a connection; the receiver carries every frame pushed to it
    pub fn open(
        presence: PresenceManager,
        relay: MessageRelay,
    ) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = presence.on_connect(tx);
        let core = Self {
            handle: Some(handle),
            presence,
            relay,
        };
        (core, rx)
    }

    pub fn connected_frame(&self) -> Option<ServerEvent> {
        self.handle
            .as_ref()
            .map(|handle| ServerEvent::connected(handle.connection_id()))
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.handle.as_ref().and_then(|handle| handle.user_id())
    }

    /// Parse and apply one text frame. Returns the frames to send back on
    /// this connection; a bad frame yields an `error` frame, never a close.
    pub fn handle_text(&mut self, text: &str) -> Vec<ServerEvent> {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "unparseable client frame");
                return vec![ServerEvent::error("BAD_FRAME", e.to_string())];
            }
        };

        match self.handle_event(event) {
            Ok(replies) => replies,
            Err(e) => {
                tracing::debug!(error = %e, "client event rejected");
                vec![ServerEvent::error(e.code(), e.to_string())]
            }
        }
    }

    pub fn handle_event(&mut self, event: ClientEvent) -> AppResult<Vec<ServerEvent>> {
        let handle = self.handle.as_mut().ok_or(AppError::Internal)?;

        match event {
            ClientEvent::AddUser { user_id } => {
                let user_id = UserId::normalize(&user_id)?;
                let superseded = self.presence.on_add_user(handle, user_id.clone());
                let connection_id = handle.connection_id();
                tracing::debug!(
                    room = %RoomKey::for_user(&user_id),
                    connection_id = %connection_id,
                    superseded = ?superseded,
                    "joined room"
                );

                // A registration racing in after this one reaches this socket
                // as a `superseded` frame on its push channel.
                Ok(vec![ServerEvent::Joined {
                    user_id,
                    connection_id,
                }])
            }

            ClientEvent::SendMessage {
                sender_id,
                receiver_id,
                text,
                property_id,
                property_title,
            } => {
                let announced = handle.user_id().cloned().ok_or_else(|| {
                    AppError::Validation("add-user is required before send-message".to_string())
                })?;
                if let Some(raw) = sender_id {
                    if UserId::normalize(&raw)? != announced {
                        return Err(AppError::Validation(
                            "sender does not match the announced user".to_string(),
                        ));
                    }
                }
                let receiver = UserId::normalize(&receiver_id)
                    .map_err(|_| AppError::Validation("receiver is required".to_string()))?;

                let context = property_id.map(|property_id| PropertyContext {
                    property_id,
                    title: property_title,
                });
                let message = ChatMessage::new(announced, receiver, text, context)?;
                let delivery = self.relay.send_direct(&message);

                Ok(vec![ServerEvent::MessageStatus {
                    message_id: message.id,
                    delivered: delivery.delivered,
                }])
            }

            ClientEvent::RemoveUser => {
                self.presence.on_remove_user(handle);
                Ok(Vec::new())
            }

            ClientEvent::Ping { timestamp } => Ok(vec![ServerEvent::Pong { timestamp }]),
        }
    }

    /// Release the connection. Safe to call more than once.
    pub fn close(&mut self) -> Option<Removal> {
        self.handle
            .take()
            .map(|handle| self.presence.on_disconnect(handle))
    }
}

pub struct WsSession {
    state: AppState,
    core: Option<SessionCore>,
    heartbeat: WebSocketConfig,
    hb: Instant,
}

impl WsSession {
    pub fn new(state: AppState) -> Self {
        let heartbeat = state.config.websocket.clone();
        Self {
            state,
            core: None,
            heartbeat,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.hb) > act.heartbeat.client_timeout {
                tracing::warn!("WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn send(&self, event: &ServerEvent, ctx: &mut ws::WebsocketContext<Self>) {
        match event.to_json() {
            Ok(json) => ctx.text(json),
            Err(e) => tracing::error!("Failed to serialize server event: {}", e),
        }
    }

    fn on_text(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(core) = self.core.as_mut() else {
            return;
        };

        for reply in core.handle_text(text) {
            if let ServerEvent::Joined { user_id, .. } = &reply {
                // Let the client render its badge without an extra request
                let dispatcher = self.state.dispatcher.clone();
                let user_id = user_id.clone();
                actix::spawn(async move {
                    dispatcher.refresh_unread_count(&user_id).await;
                });
            }
            self.send(&reply, ctx);
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (core, receiver) =
            SessionCore::open(self.state.presence.clone(), self.state.relay.clone());

        self.hb(ctx);
        ctx.add_stream(UnboundedReceiverStream::new(receiver));
        if let Some(frame) = core.connected_frame() {
            self.send(&frame, ctx);
        }
        self.core = Some(core);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(core) = self.core.as_mut() {
            let user_id = core.user_id().cloned();
            let removal = core.close();
            tracing::info!(
                user_id = user_id.as_ref().map(|u| u.as_str()).unwrap_or("-"),
                removal = ?removal,
                "WebSocket session stopped"
            );
        }
    }
}

// Frames pushed by the relay and dispatcher
impl StreamHandler<ServerEvent> for WsSession {
    fn handle(&mut self, event: ServerEvent, ctx: &mut Self::Context) {
        self.send(&event, ctx);
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {}
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                self.on_text(&text, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                self.send(
                    &ServerEvent::error("BAD_FRAME", "binary frames are not supported"),
                    ctx,
                );
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!("WebSocket close message received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::warn!("WebSocket protocol error: {}", e);
                ctx.stop();
            }
        }
    }
}

/// `GET /ws`
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    ws::start(WsSession::new(state.get_ref().clone()), &req, stream)
}
