mod identity;
mod message;
mod notification;
pub mod pagination;

pub use identity::{UserId, UserRole};
pub use message::{ChatMessage, Delivery, PropertyContext};
pub use notification::{
    NewNotification, Notification, NotificationPriority, NotificationStatus, NotificationType,
};
pub use pagination::{ListFilter, ListQuery, ListWindow, NotificationPage, Pagination};
