/// Presence query handlers
///
/// Mirrors the registry for other services and dashboards; clients learn about
/// their own presence through the WebSocket instead.
use super::ApiResponse;
use crate::error::AppResult;
use crate::middleware::{AuthenticatedUser, InternalCaller};
use crate::models::UserId;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// GET /api/v1/presence/{userId}
pub async fn user_presence(
    state: web::Data<AppState>,
    _user: AuthenticatedUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let user_id = UserId::parse(&path.into_inner())?;
    let online = state.router.presence().is_online(&user_id);

    Ok(HttpResponse::Ok().json(ApiResponse::ok(json!({
        "userId": user_id,
        "online": online,
    }))))
}

/// GET /api/v1/presence (internal)
pub async fn online_users(
    state: web::Data<AppState>,
    _caller: InternalCaller,
) -> AppResult<HttpResponse> {
    let users = state.router.presence().online_users();

    Ok(HttpResponse::Ok().json(ApiResponse::ok(json!({
        "count": users.len(),
        "users": users,
    }))))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/presence")
            .route("", web::get().to(online_users))
            .route("/{user_id}", web::get().to(user_presence)),
    );
}
