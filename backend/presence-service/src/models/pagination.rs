use super::Notification;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListFilter {
    #[default]
    All,
    Unread,
    Read,
}

impl FromStr for ListFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(ListFilter::All),
            "unread" => Ok(ListFilter::Unread),
            "read" => Ok(ListFilter::Read),
            other => Err(AppError::Validation(format!("unknown filter: {other}"))),
        }
    }
}

/// One page request against a user's notifications.
///
/// Rows are ordered by their store sequence, which never changes once
/// assigned. `cursor` continues strictly below the last sequence of the
/// previous page, so a row that becomes visible between fetches can neither
/// repeat nor push another row off a page. `as_of` pins `total` (and the
/// offset form used when no cursor is given) to the rows of the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: ListFilter,
    pub page: u32,
    pub limit: u32,
    pub as_of: Option<i64>,
    pub cursor: Option<i64>,
}

impl ListQuery {
    pub fn new(filter: ListFilter, page: u32, limit: u32) -> Self {
        Self {
            filter,
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
            as_of: None,
            cursor: None,
        }
    }

    pub fn as_of(mut self, sequence: i64) -> Self {
        self.as_of = Some(sequence);
        self
    }

    /// Continue after the row whose sequence is `cursor`
    pub fn after(mut self, cursor: i64) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Rows skipped before this page; zero when paging by cursor
    pub fn offset(&self) -> u64 {
        if self.cursor.is_some() {
            return 0;
        }
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(ListFilter::All, 1, DEFAULT_PAGE_LIMIT)
    }
}

/// Rows of one page plus the snapshot they were read from
#[derive(Debug, Clone)]
pub struct ListWindow {
    pub items: Vec<Notification>,
    pub total: u64,
    pub as_of: i64,
    /// Sequence to pass as `cursor` for the following page, if one exists
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
    pub as_of: i64,
    pub next_cursor: Option<i64>,
}

impl Pagination {
    pub fn new(query: &ListQuery, window: &ListWindow) -> Self {
        let limit = u64::from(query.limit);
        Self {
            page: query.page,
            limit: query.limit,
            total: window.total,
            pages: window.total.div_ceil(limit),
            as_of: window.as_of,
            next_cursor: window.next_cursor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub pagination: Pagination,
    /// Current unread total for the user, independent of filter and page
    pub unread_count: u64,
}
