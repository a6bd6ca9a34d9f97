/// Notification handlers
use super::ApiResponse;
use crate::error::AppResult;
use crate::middleware::{AuthenticatedUser, InternalCaller};
use crate::models::pagination::DEFAULT_PAGE_LIMIT;
use crate::models::{ListFilter, ListQuery, NewNotification};
use crate::services::BusinessEvent;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub filter: Option<String>,
    pub as_of: Option<i64>,
    pub cursor: Option<i64>,
}

impl ListParams {
    pub fn into_query(self) -> AppResult<ListQuery> {
        let filter: ListFilter = match self.filter.as_deref() {
            Some(raw) => raw.parse()?,
            None => ListFilter::All,
        };
        let query = ListQuery::new(
            filter,
            self.page.unwrap_or(1),
            self.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        );
        let query = match self.as_of {
            Some(seq) => query.as_of(seq),
            None => query,
        };
        Ok(match self.cursor {
            Some(cursor) => query.after(cursor),
            None => query,
        })
    }
}

/// List the caller's notifications
///
/// GET /api/v1/notifications?page&limit&filter&asOf&cursor
///
/// `cursor` is the previous page's `pagination.nextCursor`; it takes
/// precedence over `page`.
pub async fn list_notifications(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    params: web::Query<ListParams>,
) -> AppResult<HttpResponse> {
    let query = params.into_inner().into_query()?;
    let page = state.dispatcher.list(&user.user_id, &query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(page)))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> AppResult<HttpResponse> {
    let count = state.dispatcher.unread_count(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(json!({ "unreadCount": count }))))
}

/// Create a notification and push it if the target is online
///
/// POST /api/v1/notifications (internal)
pub async fn create_notification(
    state: web::Data<AppState>,
    _caller: InternalCaller,
    body: web::Json<NewNotification>,
) -> AppResult<HttpResponse> {
    let (notification, delivery) = state
        .dispatcher
        .create_and_dispatch(body.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::ok(json!({
        "notification": notification,
        "delivered": delivery.delivered,
    }))))
}

/// Fan a business event out to everyone it concerns
///
/// POST /api/v1/notifications/events (internal)
pub async fn publish_event(
    state: web::Data<AppState>,
    _caller: InternalCaller,
    body: web::Json<BusinessEvent>,
) -> AppResult<HttpResponse> {
    let results = state.fanout.publish(&body).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(json!({ "notifications": results }))))
}

/// PUT /api/v1/notifications/{id}/read
pub async fn mark_as_read(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let notification = state
        .dispatcher
        .mark_read(path.into_inner(), &user.user_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(notification)))
}

/// PUT /api/v1/notifications/{id}/archive
pub async fn archive(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let notification = state
        .dispatcher
        .archive(path.into_inner(), &user.user_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(notification)))
}

/// POST /api/v1/notifications/mark-all-read
pub async fn mark_all_read(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> AppResult<HttpResponse> {
    let updated = state.dispatcher.mark_all_read(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(json!({ "updated": updated }))))
}

/// DELETE /api/v1/notifications/{id}
pub async fn delete_notification(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let removed = state
        .dispatcher
        .remove(path.into_inner(), &user.user_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(removed)))
}

/// POST /api/v1/notifications/{id}/email-sent (internal)
pub async fn email_sent(
    state: web::Data<AppState>,
    _caller: InternalCaller,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let notification = state
        .dispatcher
        .record_email_sent(path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(notification)))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/notifications")
            .route("", web::get().to(list_notifications))
            .route("", web::post().to(create_notification))
            .route("/events", web::post().to(publish_event))
            .route("/unread-count", web::get().to(unread_count))
            .route("/mark-all-read", web::post().to(mark_all_read))
            .route("/{id}", web::delete().to(delete_notification))
            .route("/{id}/read", web::put().to(mark_as_read))
            .route("/{id}/archive", web::put().to(archive))
            .route("/{id}/email-sent", web::post().to(email_sent)),
    );
}
