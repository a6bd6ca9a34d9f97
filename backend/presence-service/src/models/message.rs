use super::UserId;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Property a chat message is about
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyContext {
    pub property_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Ephemeral direct chat message. Not persisted by this service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_context: Option<PropertyContext>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        sender_id: UserId,
        receiver_id: UserId,
        text: impl Into<String>,
        property_context: Option<PropertyContext>,
    ) -> AppResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(AppError::Validation("message text must not be empty".to_string()));
        }
        if let Some(ctx) = &property_context {
            if ctx.property_id.trim().is_empty() {
                return Err(AppError::Validation("propertyId must not be empty".to_string()));
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            property_context,
            text,
            created_at: Utc::now(),
        })
    }
}

/// Outcome of a best-effort push. `delivered == false` is a delivery miss,
/// not an error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: bool,
}

impl Delivery {
    pub fn delivered() -> Self {
        Self { delivered: true }
    }

    pub fn missed() -> Self {
        Self { delivered: false }
    }
}
