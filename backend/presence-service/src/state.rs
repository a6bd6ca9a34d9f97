use crate::collaborators::{PropertyReadModel, UserDirectory};
use crate::config::Config;
use crate::presence::PresenceManager;
use crate::relay::{MessageRelay, RoomRouter};
use crate::services::{EventFanout, NotificationDispatcher};
use crate::store::NotificationStore;
use std::sync::Arc;

/// Shared application state, cloned into every worker and WebSocket session
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub presence: PresenceManager,
    pub router: RoomRouter,
    pub relay: MessageRelay,
    pub dispatcher: NotificationDispatcher,
    pub fanout: EventFanout,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn UserDirectory>,
        properties: Arc<dyn PropertyReadModel>,
    ) -> Self {
        let presence = PresenceManager::default();
        let router = RoomRouter::new(presence.view());
        let relay = MessageRelay::new(router.clone());
        let dispatcher = NotificationDispatcher::new(store, router.clone());
        let fanout = EventFanout::new(dispatcher.clone(), directory, properties);

        Self {
            config: Arc::new(config),
            presence,
            router,
            relay,
            dispatcher,
            fanout,
        }
    }
}
