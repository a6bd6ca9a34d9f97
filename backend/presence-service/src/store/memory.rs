use super::NotificationStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    ListFilter, ListQuery, ListWindow, NewNotification, Notification, NotificationStatus, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    // sequence -> notification
    rows: BTreeMap<i64, Notification>,
    // id -> sequence
    ids: HashMap<Uuid, i64>,
    last_sequence: i64,
}

impl Inner {
    fn owned_mut(&mut self, id: Uuid, owner: &UserId) -> AppResult<&mut Notification> {
        let seq = self.ids.get(&id).copied().ok_or(AppError::NotFound)?;
        match self.rows.get_mut(&seq) {
            Some(row) if &row.target_user_id == owner => Ok(row),
            _ => Err(AppError::NotFound),
        }
    }
}

fn matches_filter(row: &Notification, filter: ListFilter) -> bool {
    match filter {
        ListFilter::All => true,
        ListFilter::Unread => row.status == NotificationStatus::Unread,
        ListFilter::Read => row.status == NotificationStatus::Read,
    }
}

/// Process-local store for tests and single-node development
#[derive(Clone, Default)]
pub struct InMemoryNotificationStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, new: NewNotification) -> AppResult<Notification> {
        let mut inner = self.inner.write().await;
        inner.last_sequence += 1;
        let sequence = inner.last_sequence;

        let notification = Notification {
            id: Uuid::new_v4(),
            target_user_id: new.target_user_id,
            target_user_type: new.target_user_type,
            notification_type: new.notification_type,
            title: new.title,
            message: new.message,
            data: new.data,
            status: NotificationStatus::Unread,
            priority: new.priority,
            created_at: Utc::now(),
            read_at: None,
            email_sent: new.email_sent,
            sequence,
        };

        inner.ids.insert(notification.id, sequence);
        inner.rows.insert(sequence, notification.clone());
        Ok(notification)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Notification>> {
        let inner = self.inner.read().await;
        Ok(inner
            .ids
            .get(&id)
            .and_then(|seq| inner.rows.get(seq))
            .cloned())
    }

    async fn list(&self, user_id: &UserId, query: &ListQuery) -> AppResult<ListWindow> {
        let inner = self.inner.read().await;
        let owned: Vec<&Notification> = inner
            .rows
            .values()
            .filter(|row| &row.target_user_id == user_id)
            .collect();

        let as_of = match query.as_of {
            Some(seq) => seq,
            None => owned.iter().map(|row| row.sequence).max().unwrap_or(0),
        };

        let visible: Vec<&Notification> = owned
            .into_iter()
            .rev()
            .filter(|row| row.sequence <= as_of && matches_filter(row, query.filter))
            .collect();
        let total = visible.len() as u64;

        let limit = query.limit as usize;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let mut items: Vec<Notification> = visible
            .into_iter()
            .filter(|row| query.cursor.map_or(true, |cursor| row.sequence < cursor))
            .skip(offset)
            .take(limit + 1)
            .cloned()
            .collect();

        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|row| row.sequence)
        } else {
            None
        };

        Ok(ListWindow {
            items,
            total,
            as_of,
            next_cursor,
        })
    }

    async fn unread_count(&self, user_id: &UserId) -> AppResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .values()
            .filter(|row| &row.target_user_id == user_id && row.is_unread())
            .count() as u64)
    }

    async fn mark_read(&self, id: Uuid, owner: &UserId) -> AppResult<Notification> {
        let mut inner = self.inner.write().await;
        let row = inner.owned_mut(id, owner)?;
        row.status = row.status.advance(NotificationStatus::Read);
        row.read_at.get_or_insert_with(Utc::now);
        Ok(row.clone())
    }

    async fn mark_all_read(&self, owner: &UserId) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let mut updated = 0;
        for row in inner.rows.values_mut() {
            if &row.target_user_id == owner && row.is_unread() {
                row.status = NotificationStatus::Read;
                row.read_at = Some(now);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn archive(&self, id: Uuid, owner: &UserId) -> AppResult<Notification> {
        let mut inner = self.inner.write().await;
        let row = inner.owned_mut(id, owner)?;
        row.status = row.status.advance(NotificationStatus::Archived);
        row.read_at.get_or_insert_with(Utc::now);
        Ok(row.clone())
    }

    async fn remove(&self, id: Uuid, owner: &UserId) -> AppResult<Notification> {
        let mut inner = self.inner.write().await;
        let sequence = inner.owned_mut(id, owner)?.sequence;
        inner.ids.remove(&id);
        inner.rows.remove(&sequence).ok_or(AppError::NotFound)
    }

    async fn mark_email_sent(&self, id: Uuid) -> AppResult<Notification> {
        let mut inner = self.inner.write().await;
        let seq = inner.ids.get(&id).copied().ok_or(AppError::NotFound)?;
        let row = inner.rows.get_mut(&seq).ok_or(AppError::NotFound)?;
        row.email_sent = true;
        Ok(row.clone())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        let expired: Vec<(i64, Uuid)> = inner
            .rows
            .values()
            .filter(|row| row.created_at < cutoff)
            .map(|row| (row.sequence, row.id))
            .collect();

        for (seq, id) in &expired {
            inner.rows.remove(seq);
            inner.ids.remove(id);
        }
        Ok(expired.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationType, UserRole};
    use std::collections::HashSet;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn new_for(user: &str, title: &str) -> NewNotification {
        NewNotification::new(
            uid(user),
            UserRole::Buyer,
            NotificationType::PriceChange,
            title,
            "Price dropped",
        )
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_sequence() {
        let store = InMemoryNotificationStore::new();
        let a = store.insert(new_for("1", "a")).await.unwrap();
        let b = store.insert(new_for("1", "b")).await.unwrap();

        assert!(b.sequence > a.sequence);
        assert_eq!(a.status, NotificationStatus::Unread);
        assert_eq!(store.get(a.id).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_scoped_to_owner() {
        let store = InMemoryNotificationStore::new();
        store.insert(new_for("1", "first")).await.unwrap();
        store.insert(new_for("2", "other")).await.unwrap();
        store.insert(new_for("1", "second")).await.unwrap();

        let window = store.list(&uid("1"), &ListQuery::default()).await.unwrap();
        let titles: Vec<_> = window.items.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
        assert_eq!(window.total, 2);
    }

    #[tokio::test]
    async fn test_snapshot_paging_survives_concurrent_inserts() {
        let store = InMemoryNotificationStore::new();
        for i in 0..10 {
            store.insert(new_for("1", &format!("n{i}"))).await.unwrap();
        }

        let query = ListQuery::new(ListFilter::All, 1, 4);
        let page1 = store.list(&uid("1"), &query).await.unwrap();

        for i in 0..5 {
            store.insert(new_for("1", &format!("late{i}"))).await.unwrap();
        }

        let mut seen: HashSet<Uuid> = page1.items.iter().map(|n| n.id).collect();
        for page in 2..=3 {
            let query = ListQuery::new(ListFilter::All, page, 4).as_of(page1.as_of);
            let window = store.list(&uid("1"), &query).await.unwrap();
            assert_eq!(window.total, 10);
            for item in window.items {
                assert!(seen.insert(item.id), "duplicate item across pages");
            }
        }
        assert_eq!(seen.len(), 10);
    }

    #[tokio::test]
    async fn test_cursor_pages_follow_sequence_order() {
        let store = InMemoryNotificationStore::new();
        for i in 0..5 {
            store.insert(new_for("1", &format!("n{i}"))).await.unwrap();
        }

        let query = ListQuery::new(ListFilter::All, 1, 2);
        let page1 = store.list(&uid("1"), &query).await.unwrap();
        let titles: Vec<_> = page1.items.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["n4", "n3"]);

        let cursor = page1.next_cursor.unwrap();
        let page2 = store.list(&uid("1"), &query.after(cursor)).await.unwrap();
        let titles: Vec<_> = page2.items.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["n2", "n1"]);

        let page3 = store
            .list(&uid("1"), &query.after(page2.next_cursor.unwrap()))
            .await
            .unwrap();
        assert_eq!(page3.items.len(), 1);
        assert_eq!(page3.next_cursor, None);
        assert_eq!(page3.total, 5);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent_and_archive_sticks() {
        let store = InMemoryNotificationStore::new();
        let n = store.insert(new_for("1", "t")).await.unwrap();

        let first = store.mark_read(n.id, &uid("1")).await.unwrap();
        let second = store.mark_read(n.id, &uid("1")).await.unwrap();
        assert_eq!(second.status, NotificationStatus::Read);
        assert_eq!(first.read_at, second.read_at);

        store.archive(n.id, &uid("1")).await.unwrap();
        let again = store.mark_read(n.id, &uid("1")).await.unwrap();
        assert_eq!(again.status, NotificationStatus::Archived);
    }

    #[tokio::test]
    async fn test_foreign_owner_is_not_found() {
        let store = InMemoryNotificationStore::new();
        let n = store.insert(new_for("1", "t")).await.unwrap();

        assert_eq!(
            store.mark_read(n.id, &uid("2")).await.unwrap_err(),
            AppError::NotFound
        );
        assert_eq!(
            store.remove(n.id, &uid("2")).await.unwrap_err(),
            AppError::NotFound
        );
        assert!(store.get(n.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_filters_and_mark_all_read() {
        let store = InMemoryNotificationStore::new();
        let mut ids = Vec::new();
        for i in 0..7 {
            ids.push(store.insert(new_for("1", &format!("n{i}"))).await.unwrap().id);
        }
        store.mark_read(ids[0], &uid("1")).await.unwrap();
        store.mark_read(ids[1], &uid("1")).await.unwrap();

        let unread = ListQuery::new(ListFilter::Unread, 1, 10);
        assert_eq!(store.list(&uid("1"), &unread).await.unwrap().total, 5);

        assert_eq!(store.mark_all_read(&uid("1")).await.unwrap(), 5);
        assert_eq!(store.unread_count(&uid("1")).await.unwrap(), 0);

        let read = ListQuery::new(ListFilter::Read, 1, 10);
        assert_eq!(store.list(&uid("1"), &read).await.unwrap().total, 7);
    }

    #[tokio::test]
    async fn test_remove_and_purge() {
        let store = InMemoryNotificationStore::new();
        let a = store.insert(new_for("1", "a")).await.unwrap();
        let b = store.insert(new_for("1", "b")).await.unwrap();

        let removed = store.remove(a.id, &uid("1")).await.unwrap();
        assert_eq!(removed.id, a.id);
        assert!(store.get(a.id).await.unwrap().is_none());

        let purged = store
            .purge_older_than(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(store.get(b.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_email_sent() {
        let store = InMemoryNotificationStore::new();
        let n = store.insert(new_for("1", "t")).await.unwrap();
        assert!(store.mark_email_sent(n.id).await.unwrap().email_sent);
        assert_eq!(
            store.mark_email_sent(Uuid::new_v4()).await.unwrap_err(),
            AppError::NotFound
        );
    }
}
