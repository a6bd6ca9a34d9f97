use super::{DirectoryEntry, PropertyReadModel, PropertySummary, UserDirectory};
use crate::error::AppResult;
use crate::models::UserId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Directory seeded in-process, used with the in-memory store
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<DashMap<UserId, DirectoryEntry>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, entry: DirectoryEntry) {
        self.users.insert(entry.user_id.clone(), entry);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find(&self, user_id: &UserId) -> AppResult<Option<DirectoryEntry>> {
        Ok(self.users.get(user_id).map(|entry| entry.value().clone()))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPropertyReadModel {
    properties: Arc<DashMap<String, PropertySummary>>,
    watchers: Arc<DashMap<String, Vec<UserId>>>,
}

impl InMemoryPropertyReadModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, property: PropertySummary) {
        self.properties.insert(property.property_id.clone(), property);
    }

    pub fn watch(&self, property_id: &str, user_id: UserId) {
        let mut watchers = self.watchers.entry(property_id.to_string()).or_default();
        if !watchers.contains(&user_id) {
            watchers.push(user_id);
        }
    }
}

#[async_trait]
impl PropertyReadModel for InMemoryPropertyReadModel {
    async fn find(&self, property_id: &str) -> AppResult<Option<PropertySummary>> {
        Ok(self
            .properties
            .get(property_id)
            .map(|entry| entry.value().clone()))
    }

    async fn watchers(&self, property_id: &str) -> AppResult<Vec<UserId>> {
        Ok(self
            .watchers
            .get(property_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}
