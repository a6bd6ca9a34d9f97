use super::{UserId, UserRole};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Business event kinds that produce notifications
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Agent assigned to a listing
    NewAssignment,
    /// Buyer booked an inspection
    InspectionBooked,
    /// Previously booked inspection was cancelled
    InspectionCancelled,
    /// Asking price of a watched listing changed
    PriceChange,
    /// Direct chat message (for offline recipients)
    NewMessage,
    /// Offer received on a listing
    OfferReceived,
    /// Listing status changed (under offer, sold, withdrawn)
    ListingStatus,
    /// Platform announcement
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::NewAssignment => "new_assignment",
            NotificationType::InspectionBooked => "inspection_booked",
            NotificationType::InspectionCancelled => "inspection_cancelled",
            NotificationType::PriceChange => "price_change",
            NotificationType::NewMessage => "new_message",
            NotificationType::OfferReceived => "offer_received",
            NotificationType::ListingStatus => "listing_status",
            NotificationType::System => "system",
        }
    }
}

impl FromStr for NotificationType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new_assignment" => Ok(NotificationType::NewAssignment),
            "inspection_booked" => Ok(NotificationType::InspectionBooked),
            "inspection_cancelled" => Ok(NotificationType::InspectionCancelled),
            "price_change" => Ok(NotificationType::PriceChange),
            "new_message" => Ok(NotificationType::NewMessage),
            "offer_received" => Ok(NotificationType::OfferReceived),
            "listing_status" => Ok(NotificationType::ListingStatus),
            "system" => Ok(NotificationType::System),
            other => Err(AppError::Validation(format!(
                "unknown notification type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Medium => "medium",
            NotificationPriority::High => "high",
            NotificationPriority::Urgent => "urgent",
        }
    }
}

impl FromStr for NotificationPriority {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(NotificationPriority::Low),
            "medium" => Ok(NotificationPriority::Medium),
            "high" => Ok(NotificationPriority::High),
            "urgent" => Ok(NotificationPriority::Urgent),
            other => Err(AppError::Validation(format!("unknown priority: {other}"))),
        }
    }
}

/// Read state of a notification.
///
/// Transitions only move forward: unread -> read -> archived. Deletion is not
/// a status; deleted rows are gone from the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Unread,
    Read,
    Archived,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Unread => "unread",
            NotificationStatus::Read => "read",
            NotificationStatus::Archived => "archived",
        }
    }

    /// Status after applying `next`; a backward move keeps the current status.
    pub fn advance(self, next: NotificationStatus) -> NotificationStatus {
        self.max(next)
    }
}

impl FromStr for NotificationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unread" => Ok(NotificationStatus::Unread),
            "read" => Ok(NotificationStatus::Read),
            "archived" => Ok(NotificationStatus::Archived),
            other => Err(AppError::Validation(format!("unknown status: {other}"))),
        }
    }
}

/// Durable notification record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,

    pub target_user_id: UserId,

    pub target_user_type: UserRole,

    #[serde(rename = "type")]
    pub notification_type: NotificationType,

    pub title: String,

    pub message: String,

    /// Business payload, e.g. `{"propertyTitle": "123 Main St"}`
    pub data: serde_json::Value,

    pub status: NotificationStatus,

    pub priority: NotificationPriority,

    pub created_at: DateTime<Utc>,

    pub read_at: Option<DateTime<Utc>>,

    /// Set by business logic once its email/SMS sender succeeded
    pub email_sent: bool,

    /// Store-assigned, strictly increasing paging key
    #[serde(skip)]
    pub sequence: i64,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.status == NotificationStatus::Unread
    }
}

/// Request to create a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub target_user_id: UserId,
    pub target_user_type: UserRole,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default = "empty_data")]
    pub data: serde_json::Value,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(default)]
    pub email_sent: bool,
}

fn empty_data() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl NewNotification {
    pub fn new(
        target_user_id: UserId,
        target_user_type: UserRole,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            target_user_id,
            target_user_type,
            notification_type,
            title: title.into(),
            message: message.into(),
            data: empty_data(),
            priority: NotificationPriority::default(),
            email_sent: false,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title must not be empty".to_string()));
        }
        if self.message.trim().is_empty() {
            return Err(AppError::Validation("message must not be empty".to_string()));
        }
        if !self.data.is_object() {
            return Err(AppError::Validation("data must be a JSON object".to_string()));
        }
        Ok(())
    }
}
