/// Notification Dispatcher
///
/// Persist first, then push. The store is the source of truth: a push that
/// misses (offline user, closed socket) leaves the notification to be picked
/// up by the next poll, while a store failure is surfaced to the caller.
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{
    Delivery, ListQuery, NewNotification, Notification, NotificationPage, Pagination, UserId,
};
use crate::relay::RoomRouter;
use crate::store::NotificationStore;
use crate::websocket::ServerEvent;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    router: RoomRouter,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>, router: RoomRouter) -> Self {
        Self { store, router }
    }

    /// Validate and persist. Returns the stored record with `status = unread`.
    pub async fn create(&self, new: NewNotification) -> AppResult<Notification> {
        new.validate()?;

        let notification = self.store.insert(new).await?;
        metrics::record_notification_created(notification.notification_type.as_str());
        info!(
            notification_id = %notification.id,
            target_user_id = %notification.target_user_id,
            notification_type = notification.notification_type.as_str(),
            priority = notification.priority.as_str(),
            "notification created"
        );

        Ok(notification)
    }

    /// Push a persisted notification to its target's room. Never fails.
    pub fn dispatch(&self, notification: &Notification) -> Delivery {
        let delivered = self.router.push_to_user(
            &notification.target_user_id,
            ServerEvent::Notification {
                notification: notification.clone(),
            },
        );
        metrics::record_delivery("notification", delivered);
        debug!(
            notification_id = %notification.id,
            target_user_id = %notification.target_user_id,
            delivered,
            "notification dispatched"
        );

        if delivered {
            Delivery::delivered()
        } else {
            Delivery::missed()
        }
    }

    pub async fn create_and_dispatch(
        &self,
        new: NewNotification,
    ) -> AppResult<(Notification, Delivery)> {
        let notification = self.create(new).await?;
        let delivery = self.dispatch(&notification);
        Ok((notification, delivery))
    }

    pub async fn list(&self, user_id: &UserId, query: &ListQuery) -> AppResult<NotificationPage> {
        let window = self.store.list(user_id, query).await?;
        let unread_count = self.store.unread_count(user_id).await?;

        Ok(NotificationPage {
            pagination: Pagination::new(query, &window),
            notifications: window.items,
            unread_count,
        })
    }

    pub async fn unread_count(&self, user_id: &UserId) -> AppResult<u64> {
        self.store.unread_count(user_id).await
    }

    pub async fn mark_read(&self, id: Uuid, owner: &UserId) -> AppResult<Notification> {
        let notification = self.store.mark_read(id, owner).await?;
        self.refresh_unread_count(owner).await;
        Ok(notification)
    }

    pub async fn mark_all_read(&self, owner: &UserId) -> AppResult<u64> {
        let updated = self.store.mark_all_read(owner).await?;
        info!(user_id = %owner, updated, "marked all notifications read");
        if updated > 0 {
            self.refresh_unread_count(owner).await;
        }
        Ok(updated)
    }

    pub async fn archive(&self, id: Uuid, owner: &UserId) -> AppResult<Notification> {
        let notification = self.store.archive(id, owner).await?;
        self.refresh_unread_count(owner).await;
        Ok(notification)
    }

    /// Delete and return the removed record
    pub async fn remove(&self, id: Uuid, owner: &UserId) -> AppResult<Notification> {
        let removed = self.store.remove(id, owner).await?;
        debug!(notification_id = %id, user_id = %owner, "notification deleted");
        if removed.is_unread() {
            self.refresh_unread_count(owner).await;
        }
        Ok(removed)
    }

    /// Record that the out-of-band email/SMS for `id` went out
    pub async fn record_email_sent(&self, id: Uuid) -> AppResult<Notification> {
        self.store.mark_email_sent(id).await
    }

    /// Delete notifications older than `retention_days`
    pub async fn purge_expired(&self, retention_days: i64) -> AppResult<u64> {
        let cutoff = Duration::try_days(retention_days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| {
                AppError::Validation(format!("retention window out of range: {retention_days} days"))
            })?;
        self.store.purge_older_than(cutoff).await
    }

    /// Best-effort push of the current unread total to the user's room
    pub async fn refresh_unread_count(&self, user_id: &UserId) -> Delivery {
        if !self.router.presence().is_online(user_id) {
            return Delivery::missed();
        }

        match self.store.unread_count(user_id).await {
            Ok(count) => {
                let delivered = self
                    .router
                    .push_to_user(user_id, ServerEvent::UnreadCount { count });
                metrics::record_delivery("unread_count", delivered);
                if delivered {
                    Delivery::delivered()
                } else {
                    Delivery::missed()
                }
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "skipping unread-count push");
                Delivery::missed()
            }
        }
    }
}
