use super::{DirectoryEntry, PropertyReadModel, PropertySummary, UserDirectory};
use crate::error::{AppError, AppResult};
use crate::models::{UserId, UserRole};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

/// Reads the platform's `users` table
#[derive(Clone)]
pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find(&self, user_id: &UserId) -> AppResult<Option<DirectoryEntry>> {
        let row = sqlx::query("SELECT role, display_name FROM users WHERE id::text = $1")
            .bind(user_id.as_str())
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role: String = row.try_get("role")?;
        Ok(Some(DirectoryEntry {
            user_id: user_id.clone(),
            role: role.parse::<UserRole>().map_err(|_| AppError::Internal)?,
            display_name: row.try_get("display_name")?,
        }))
    }
}

/// Reads the listing service's `properties` and `property_watchers` tables
#[derive(Clone)]
pub struct PgPropertyReadModel {
    db: PgPool,
}

impl PgPropertyReadModel {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn user_id_column(raw: String) -> AppResult<UserId> {
    UserId::parse(&raw).map_err(|_| AppError::Internal)
}

#[async_trait]
impl PropertyReadModel for PgPropertyReadModel {
    async fn find(&self, property_id: &str) -> AppResult<Option<PropertySummary>> {
        let row = sqlx::query(
            r#"
            SELECT id::text AS id, title, seller_id::text AS seller_id, agent_id::text AS agent_id
            FROM properties
            WHERE id::text = $1
            "#,
        )
        .bind(property_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let agent_id: Option<String> = row.try_get("agent_id")?;
        Ok(Some(PropertySummary {
            property_id: row.try_get("id")?,
            title: row.try_get("title")?,
            seller_id: user_id_column(row.try_get("seller_id")?)?,
            agent_id: agent_id.map(user_id_column).transpose()?,
        }))
    }

    async fn watchers(&self, property_id: &str) -> AppResult<Vec<UserId>> {
        let rows = sqlx::query(
            "SELECT user_id::text AS user_id FROM property_watchers WHERE property_id::text = $1",
        )
        .bind(property_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| user_id_column(row.try_get("user_id")?))
            .collect()
    }
}
