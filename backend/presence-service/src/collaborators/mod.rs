//! Read-only views of data owned by other platform services.
//!
//! The relay never writes users or properties; it only resolves names, roles
//! and participants when turning a business event into notifications.

mod memory;
mod postgres;

pub use memory::{InMemoryPropertyReadModel, InMemoryUserDirectory};
pub use postgres::{PgPropertyReadModel, PgUserDirectory};

use crate::error::AppResult;
use crate::models::{UserId, UserRole};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub user_id: UserId,
    pub role: UserRole,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PropertySummary {
    pub property_id: String,
    pub title: String,
    pub seller_id: UserId,
    pub agent_id: Option<UserId>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find(&self, user_id: &UserId) -> AppResult<Option<DirectoryEntry>>;
}

#[async_trait]
pub trait PropertyReadModel: Send + Sync {
    async fn find(&self, property_id: &str) -> AppResult<Option<PropertySummary>>;

    /// Users who asked to hear about changes to this listing
    async fn watchers(&self, property_id: &str) -> AppResult<Vec<UserId>>;
}
