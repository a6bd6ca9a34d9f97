//! Durable notification storage.
//!
//! The dispatcher is the only caller. Every owner-facing mutation is scoped by
//! the owner's id: a notification that exists but belongs to another user is
//! reported as `AppError::NotFound`.

mod memory;
mod postgres;

pub use memory::InMemoryNotificationStore;
pub use postgres::PgNotificationStore;

use crate::error::AppResult;
use crate::models::{ListQuery, ListWindow, NewNotification, Notification, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a new notification with `status = unread`
    async fn insert(&self, new: NewNotification) -> AppResult<Notification>;

    async fn get(&self, id: Uuid) -> AppResult<Option<Notification>>;

    /// One page of the owner's notifications, newest first
    async fn list(&self, user_id: &UserId, query: &ListQuery) -> AppResult<ListWindow>;

    async fn unread_count(&self, user_id: &UserId) -> AppResult<u64>;

    /// unread -> read. Idempotent; an archived notification stays archived.
    async fn mark_read(&self, id: Uuid, owner: &UserId) -> AppResult<Notification>;

    /// Returns the number of notifications that moved from unread to read
    async fn mark_all_read(&self, owner: &UserId) -> AppResult<u64>;

    async fn archive(&self, id: Uuid, owner: &UserId) -> AppResult<Notification>;

    /// Hard delete; returns the removed record
    async fn remove(&self, id: Uuid, owner: &UserId) -> AppResult<Notification>;

    async fn mark_email_sent(&self, id: Uuid) -> AppResult<Notification>;

    /// Delete notifications created before `cutoff`
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}
