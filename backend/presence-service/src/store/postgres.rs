use super::NotificationStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    ListFilter, ListQuery, ListWindow, NewNotification, Notification, NotificationStatus, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use tracing::{debug, error};
use uuid::Uuid;

const COLUMNS: &str = "id, sequence, target_user_id, target_user_type, notification_type, \
                       title, message, data, status, priority, email_sent, created_at, read_at";

/// Postgres-backed notification store
#[derive(Clone)]
pub struct PgNotificationStore {
    db: PgPool,
}

impl PgNotificationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn status_filter(filter: ListFilter) -> Option<&'static str> {
    match filter {
        ListFilter::All => None,
        ListFilter::Unread => Some(NotificationStatus::Unread.as_str()),
        ListFilter::Read => Some(NotificationStatus::Read.as_str()),
    }
}

/// Parse a stored enum column; a value outside the CHECK constraints means the
/// row was written by something else and is reported as an internal error.
fn parse_column<T: FromStr>(row: &PgRow, column: &str) -> AppResult<T> {
    let raw: String = row.try_get(column)?;
    T::from_str(&raw).map_err(|_| {
        error!(column, value = %raw, "unrecognized value in notifications row");
        AppError::Internal
    })
}

fn row_to_notification(row: &PgRow) -> AppResult<Notification> {
    let target: String = row.try_get("target_user_id")?;
    let target_user_id = UserId::parse(&target).map_err(|_| AppError::Internal)?;

    Ok(Notification {
        id: row.try_get("id")?,
        target_user_id,
        target_user_type: parse_column(row, "target_user_type")?,
        notification_type: parse_column(row, "notification_type")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        data: row.try_get("data")?,
        status: parse_column(row, "status")?,
        priority: parse_column(row, "priority")?,
        created_at: row.try_get("created_at")?,
        read_at: row.try_get("read_at")?,
        email_sent: row.try_get("email_sent")?,
        sequence: row.try_get("sequence")?,
    })
}

fn owned_row(row: Option<PgRow>) -> AppResult<Notification> {
    match row {
        Some(row) => row_to_notification(&row),
        None => Err(AppError::NotFound),
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(&self, new: NewNotification) -> AppResult<Notification> {
        let query = format!(
            r#"
            INSERT INTO notifications (
                id, target_user_id, target_user_type, notification_type, title, message,
                data, status, priority, email_sent, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'unread', $8, $9, $10)
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(new.target_user_id.as_str())
            .bind(new.target_user_type.as_str())
            .bind(new.notification_type.as_str())
            .bind(&new.title)
            .bind(&new.message)
            .bind(&new.data)
            .bind(new.priority.as_str())
            .bind(new.email_sent)
            .bind(Utc::now())
            .fetch_one(&self.db)
            .await
            .map_err(|e| {
                error!(target_user_id = %new.target_user_id, "failed to insert notification: {}", e);
                AppError::from(e)
            })?;

        row_to_notification(&row)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Notification>> {
        let query = format!("SELECT {COLUMNS} FROM notifications WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(row_to_notification).transpose()
    }

    async fn list(&self, user_id: &UserId, query: &ListQuery) -> AppResult<ListWindow> {
        let as_of = match query.as_of {
            Some(seq) => seq,
            None => {
                let row = sqlx::query(
                    "SELECT COALESCE(MAX(sequence), 0) AS as_of FROM notifications WHERE target_user_id = $1",
                )
                .bind(user_id.as_str())
                .fetch_one(&self.db)
                .await?;
                row.try_get("as_of")?
            }
        };
        let status = status_filter(query.filter);

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total FROM notifications
            WHERE target_user_id = $1
              AND sequence <= $2
              AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(user_id.as_str())
        .bind(as_of)
        .bind(status)
        .fetch_one(&self.db)
        .await?
        .try_get("total")?;

        let page_query = format!(
            r#"
            SELECT {COLUMNS} FROM notifications
            WHERE target_user_id = $1
              AND sequence <= $2
              AND ($3::text IS NULL OR status = $3)
              AND ($4::bigint IS NULL OR sequence < $4)
            ORDER BY sequence DESC
            LIMIT $5 OFFSET $6
            "#
        );

        let limit = query.limit as usize;
        let rows = sqlx::query(&page_query)
            .bind(user_id.as_str())
            .bind(as_of)
            .bind(status)
            .bind(query.cursor)
            .bind(i64::from(query.limit) + 1)
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.db)
            .await?;

        let mut items = rows
            .iter()
            .map(row_to_notification)
            .collect::<AppResult<Vec<_>>>()?;

        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|row| row.sequence)
        } else {
            None
        };

        debug!(
            user_id = %user_id,
            as_of,
            cursor = ?query.cursor,
            total,
            returned = items.len(),
            "listed notifications"
        );

        Ok(ListWindow {
            items,
            total: u64::try_from(total).unwrap_or(0),
            as_of,
            next_cursor,
        })
    }

    async fn unread_count(&self, user_id: &UserId) -> AppResult<u64> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS unread FROM notifications WHERE target_user_id = $1 AND status = 'unread'",
        )
        .bind(user_id.as_str())
        .fetch_one(&self.db)
        .await?
        .try_get("unread")?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn mark_read(&self, id: Uuid, owner: &UserId) -> AppResult<Notification> {
        let query = format!(
            r#"
            UPDATE notifications
            SET status = CASE WHEN status = 'unread' THEN 'read' ELSE status END,
                read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND target_user_id = $2
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(id)
            .bind(owner.as_str())
            .fetch_optional(&self.db)
            .await?;

        owned_row(row)
    }

    async fn mark_all_read(&self, owner: &UserId) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = 'read', read_at = NOW()
            WHERE target_user_id = $1 AND status = 'unread'
            "#,
        )
        .bind(owner.as_str())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn archive(&self, id: Uuid, owner: &UserId) -> AppResult<Notification> {
        let query = format!(
            r#"
            UPDATE notifications
            SET status = 'archived', read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND target_user_id = $2
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(id)
            .bind(owner.as_str())
            .fetch_optional(&self.db)
            .await?;

        owned_row(row)
    }

    async fn remove(&self, id: Uuid, owner: &UserId) -> AppResult<Notification> {
        let query = format!(
            "DELETE FROM notifications WHERE id = $1 AND target_user_id = $2 RETURNING {COLUMNS}"
        );

        let row = sqlx::query(&query)
            .bind(id)
            .bind(owner.as_str())
            .fetch_optional(&self.db)
            .await?;

        owned_row(row)
    }

    async fn mark_email_sent(&self, id: Uuid) -> AppResult<Notification> {
        let query =
            format!("UPDATE notifications SET email_sent = TRUE WHERE id = $1 RETURNING {COLUMNS}");

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        owned_row(row)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
