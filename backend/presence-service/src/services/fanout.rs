/// Business-event fan-out
///
/// Turns one platform event into one notification per interested party,
/// persisting and pushing each through the dispatcher.
use super::dispatcher::NotificationDispatcher;
use crate::collaborators::{PropertyReadModel, PropertySummary, UserDirectory};
use crate::error::{AppError, AppResult};
use crate::models::{
    NewNotification, Notification, NotificationPriority, NotificationType, UserId, UserRole,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusinessEvent {
    #[serde(rename_all = "camelCase")]
    AgentAssigned {
        property_id: String,
        agent_id: UserId,
    },
    #[serde(rename_all = "camelCase")]
    InspectionBooked {
        property_id: String,
        buyer_id: UserId,
        scheduled_for: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    PriceChanged {
        property_id: String,
        old_price: i64,
        new_price: i64,
    },
}

impl BusinessEvent {
    pub fn property_id(&self) -> &str {
        match self {
            BusinessEvent::AgentAssigned { property_id, .. }
            | BusinessEvent::InspectionBooked { property_id, .. }
            | BusinessEvent::PriceChanged { property_id, .. } => property_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BusinessEvent::AgentAssigned { .. } => "agent_assigned",
            BusinessEvent::InspectionBooked { .. } => "inspection_booked",
            BusinessEvent::PriceChanged { .. } => "price_changed",
        }
    }
}

/// One notification produced by a fan-out and whether it reached a live socket
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FannedOut {
    pub notification: Notification,
    pub delivered: bool,
}

#[derive(Clone)]
pub struct EventFanout {
    dispatcher: NotificationDispatcher,
    directory: Arc<dyn UserDirectory>,
    properties: Arc<dyn PropertyReadModel>,
}

impl EventFanout {
    pub fn new(
        dispatcher: NotificationDispatcher,
        directory: Arc<dyn UserDirectory>,
        properties: Arc<dyn PropertyReadModel>,
    ) -> Self {
        Self {
            dispatcher,
            directory,
            properties,
        }
    }

    /// Create and dispatch every notification `event` calls for.
    ///
    /// Stops at the first store failure; notifications already created stay.
    pub async fn publish(&self, event: &BusinessEvent) -> AppResult<Vec<FannedOut>> {
        let property = self
            .properties
            .find(event.property_id())
            .await?
            .ok_or(AppError::NotFound)?;

        let requests = match event {
            BusinessEvent::AgentAssigned { agent_id, .. } => {
                self.agent_assigned(&property, agent_id).await?
            }
            BusinessEvent::InspectionBooked {
                buyer_id,
                scheduled_for,
                ..
            } => {
                self.inspection_booked(&property, buyer_id, *scheduled_for)
                    .await?
            }
            BusinessEvent::PriceChanged {
                old_price,
                new_price,
                ..
            } => self.price_changed(&property, *old_price, *new_price).await?,
        };

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let (notification, delivery) = self.dispatcher.create_and_dispatch(request).await?;
            results.push(FannedOut {
                notification,
                delivered: delivery.delivered,
            });
        }

        info!(
            event = event.name(),
            property_id = %property.property_id,
            notifications = results.len(),
            "business event fanned out"
        );
        Ok(results)
    }

    async fn display_name(&self, user_id: &UserId, fallback: &str) -> AppResult<String> {
        Ok(self
            .directory
            .find(user_id)
            .await?
            .map(|entry| entry.display_name)
            .unwrap_or_else(|| fallback.to_string()))
    }

    async fn agent_assigned(
        &self,
        property: &PropertySummary,
        agent_id: &UserId,
    ) -> AppResult<Vec<NewNotification>> {
        let agent_name = self.display_name(agent_id, "An agent").await?;
        let data = json!({
            "propertyId": property.property_id,
            "propertyTitle": property.title,
            "agentId": agent_id,
        });

        Ok(vec![
            NewNotification::new(
                agent_id.clone(),
                UserRole::Agent,
                NotificationType::NewAssignment,
                "New assignment",
                format!("You have been assigned to {}", property.title),
            )
            .with_data(data.clone())
            .with_priority(NotificationPriority::High),
            NewNotification::new(
                property.seller_id.clone(),
                UserRole::Seller,
                NotificationType::ListingStatus,
                "Agent assigned",
                format!("{agent_name} is now handling {}", property.title),
            )
            .with_data(data),
        ])
    }

    async fn inspection_booked(
        &self,
        property: &PropertySummary,
        buyer_id: &UserId,
        scheduled_for: DateTime<Utc>,
    ) -> AppResult<Vec<NewNotification>> {
        let buyer_name = self.display_name(buyer_id, "A buyer").await?;
        let message = format!(
            "{buyer_name} booked an inspection of {} for {}",
            property.title,
            scheduled_for.format("%Y-%m-%d %H:%M UTC")
        );
        let data = json!({
            "propertyId": property.property_id,
            "propertyTitle": property.title,
            "buyerId": buyer_id,
            "scheduledFor": scheduled_for,
        });

        let mut targets = vec![(property.seller_id.clone(), UserRole::Seller)];
        if let Some(agent_id) = &property.agent_id {
            targets.push((agent_id.clone(), UserRole::Agent));
        }

        Ok(targets
            .into_iter()
            .map(|(user_id, role)| {
                NewNotification::new(
                    user_id,
                    role,
                    NotificationType::InspectionBooked,
                    "Inspection booked",
                    message.clone(),
                )
                .with_data(data.clone())
                .with_priority(NotificationPriority::High)
            })
            .collect())
    }

    async fn price_changed(
        &self,
        property: &PropertySummary,
        old_price: i64,
        new_price: i64,
    ) -> AppResult<Vec<NewNotification>> {
        let message = format!(
            "The price of {} changed from {} to {}",
            property.title, old_price, new_price
        );
        let data = json!({
            "propertyId": property.property_id,
            "propertyTitle": property.title,
            "oldPrice": old_price,
            "newPrice": new_price,
        });

        let mut targets = vec![(property.seller_id.clone(), UserRole::Seller)];
        for watcher in self.properties.watchers(&property.property_id).await? {
            if targets.iter().any(|(user_id, _)| user_id == &watcher) {
                continue;
            }
            let role = self
                .directory
                .find(&watcher)
                .await?
                .map(|entry| entry.role)
                .unwrap_or(UserRole::Buyer);
            targets.push((watcher, role));
        }

        Ok(targets
            .into_iter()
            .map(|(user_id, role)| {
                NewNotification::new(
                    user_id,
                    role,
                    NotificationType::PriceChange,
                    "Price change",
                    message.clone(),
                )
                .with_data(data.clone())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        DirectoryEntry, InMemoryPropertyReadModel, InMemoryUserDirectory,
    };
    use crate::models::ListQuery;
    use crate::presence::PresenceManager;
    use crate::relay::RoomRouter;
    use crate::services::dispatcher::tests::FailingStore;
    use crate::store::InMemoryNotificationStore;
    use tokio::sync::mpsc;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn collaborators() -> (Arc<InMemoryUserDirectory>, Arc<InMemoryPropertyReadModel>) {
        let directory = InMemoryUserDirectory::new();
        directory.upsert(DirectoryEntry {
            user_id: uid("agent-1"),
            role: UserRole::Agent,
            display_name: "Dana Reyes".to_string(),
        });
        directory.upsert(DirectoryEntry {
            user_id: uid("buyer-1"),
            role: UserRole::Buyer,
            display_name: "Sam Lee".to_string(),
        });

        let properties = InMemoryPropertyReadModel::new();
        properties.upsert(PropertySummary {
            property_id: "p-1".to_string(),
            title: "123 Main St".to_string(),
            seller_id: uid("seller-1"),
            agent_id: Some(uid("agent-1")),
        });
        properties.watch("p-1", uid("buyer-1"));
        properties.watch("p-1", uid("seller-1"));

        (Arc::new(directory), Arc::new(properties))
    }

    fn setup() -> (EventFanout, NotificationDispatcher, PresenceManager) {
        let manager = PresenceManager::default();
        let dispatcher = NotificationDispatcher::new(
            Arc::new(InMemoryNotificationStore::new()),
            RoomRouter::new(manager.view()),
        );
        let (directory, properties) = collaborators();
        let fanout = EventFanout::new(dispatcher.clone(), directory, properties);
        (fanout, dispatcher, manager)
    }

    #[tokio::test]
    async fn test_agent_assignment_notifies_agent_and_seller() {
        let (fanout, dispatcher, manager) = setup();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = manager.on_connect(tx);
        manager.on_add_user(&mut handle, uid("agent-1"));

        let results = fanout
            .publish(&BusinessEvent::AgentAssigned {
                property_id: "p-1".to_string(),
                agent_id: uid("agent-1"),
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].delivered);
        assert!(!results[1].delivered);
        assert_eq!(
            results[0].notification.notification_type,
            NotificationType::NewAssignment
        );
        assert!(results[1].notification.message.contains("Dana Reyes"));
        assert!(matches!(
            rx.recv().await,
            Some(crate::websocket::ServerEvent::Notification { .. })
        ));

        let seller_page = dispatcher
            .list(&uid("seller-1"), &ListQuery::default())
            .await
            .unwrap();
        assert_eq!(seller_page.unread_count, 1);
    }

    #[tokio::test]
    async fn test_inspection_booked_notifies_seller_and_agent() {
        let (fanout, _, _) = setup();
        let results = fanout
            .publish(&BusinessEvent::InspectionBooked {
                property_id: "p-1".to_string(),
                buyer_id: uid("buyer-1"),
                scheduled_for: Utc::now(),
            })
            .await
            .unwrap();

        let targets: Vec<_> = results
            .iter()
            .map(|r| r.notification.target_user_id.as_str())
            .collect();
        assert_eq!(targets, vec!["seller-1", "agent-1"]);
        assert!(results[0].notification.message.starts_with("Sam Lee"));
    }

    #[tokio::test]
    async fn test_price_change_deduplicates_seller_watch() {
        let (fanout, _, _) = setup();
        let results = fanout
            .publish(&BusinessEvent::PriceChanged {
                property_id: "p-1".to_string(),
                old_price: 900_000,
                new_price: 850_000,
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].notification.target_user_type, UserRole::Buyer);
        assert_eq!(results[1].notification.data["newPrice"], 850_000);
    }

    #[tokio::test]
    async fn test_unknown_property_is_not_found() {
        let (fanout, _, _) = setup();
        let err = fanout
            .publish(&BusinessEvent::PriceChanged {
                property_id: "missing".to_string(),
                old_price: 1,
                new_price: 2,
            })
            .await
            .unwrap_err();
        assert_eq!(err, AppError::NotFound);
    }

    #[tokio::test]
    async fn test_store_failure_aborts_fanout() {
        let manager = PresenceManager::default();
        let dispatcher =
            NotificationDispatcher::new(Arc::new(FailingStore), RoomRouter::new(manager.view()));
        let (directory, properties) = collaborators();
        let fanout = EventFanout::new(dispatcher, directory, properties);

        let err = fanout
            .publish(&BusinessEvent::AgentAssigned {
                property_id: "p-1".to_string(),
                agent_id: uid("agent-1"),
            })
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_event_wire_format() {
        let event: BusinessEvent = serde_json::from_value(serde_json::json!({
            "event": "agent_assigned",
            "propertyId": "p-1",
            "agentId": 17
        }))
        .unwrap();
        assert_eq!(
            event,
            BusinessEvent::AgentAssigned {
                property_id: "p-1".to_string(),
                agent_id: uid("17"),
            }
        );
    }
}
