/// Integration tests for the presence-service HTTP API
///
/// Runs the full actix app against the in-memory store:
/// - authentication and internal-token checks
/// - notification create / list / read / archive / delete
/// - snapshot pagination across concurrent inserts
/// - business-event fan-out
/// - presence queries and error mapping
use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use presence_service::collaborators::{
    InMemoryPropertyReadModel, InMemoryUserDirectory, PropertySummary,
};
use presence_service::middleware::auth::{issue_token, INTERNAL_TOKEN_HEADER};
use presence_service::models::{
    ListQuery, ListWindow, NewNotification, Notification, UserId, UserRole,
};
use presence_service::store::{InMemoryNotificationStore, NotificationStore};
use presence_service::{configure, AppError, AppResult, AppState, Config};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

const JWT_SECRET: &str = "test-secret";
const INTERNAL_TOKEN: &str = "internal-test-token";

fn test_config() -> Config {
    let vars: HashMap<&str, &str> = [
        ("NOTIFICATION_STORE", "memory"),
        ("JWT_SECRET", JWT_SECRET),
        ("INTERNAL_API_TOKEN", INTERNAL_TOKEN),
    ]
    .into_iter()
    .collect();
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

fn properties() -> Arc<InMemoryPropertyReadModel> {
    let model = InMemoryPropertyReadModel::new();
    model.upsert(PropertySummary {
        property_id: "p-1".to_string(),
        title: "123 Main St".to_string(),
        seller_id: UserId::parse("seller-1").unwrap(),
        agent_id: Some(UserId::parse("agent-1").unwrap()),
    });
    model.watch("p-1", UserId::parse("buyer-1").unwrap());
    Arc::new(model)
}

fn state_with(store: Arc<dyn NotificationStore>) -> AppState {
    AppState::new(
        test_config(),
        store,
        Arc::new(InMemoryUserDirectory::new()),
        properties(),
    )
}

fn memory_state() -> AppState {
    state_with(Arc::new(InMemoryNotificationStore::new()))
}

fn bearer(user: &str, role: UserRole) -> (&'static str, String) {
    let token = issue_token(
        &UserId::parse(user).unwrap(),
        role,
        JWT_SECRET,
        chrono::Duration::hours(1),
    )
    .unwrap();
    ("Authorization", format!("Bearer {token}"))
}

fn internal() -> (&'static str, &'static str) {
    (INTERNAL_TOKEN_HEADER, INTERNAL_TOKEN)
}

fn assignment_body(agent: &str) -> Value {
    json!({
        "targetUserId": agent,
        "targetUserType": "agent",
        "type": "new_assignment",
        "title": "New assignment",
        "message": "You have been assigned to 123 Main St",
        "data": {"propertyId": "p-1"},
        "priority": "high"
    })
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(configure),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health() {
    let app = app!(memory_state());
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_listing_requires_bearer_token() {
    let app = app!(memory_state());

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_create_requires_internal_token() {
    let app = app!(memory_state());

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .insert_header(bearer("agent-1", UserRole::Agent))
        .set_json(assignment_body("agent-1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_offline_create_then_poll_and_read() {
    let app = app!(memory_state());

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .insert_header(internal())
        .set_json(assignment_body("agent-1"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["delivered"], false);
    assert_eq!(body["data"]["notification"]["status"], "unread");
    let id = body["data"]["notification"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications?filter=unread&page=1&limit=10")
        .insert_header(bearer("agent-1", UserRole::Agent))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["unreadCount"], 1);
    assert_eq!(body["data"]["notifications"][0]["id"], id.as_str());
    assert_eq!(body["data"]["pagination"]["total"], 1);

    for _ in 0..2 {
        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/notifications/{id}/read"))
            .insert_header(bearer("agent-1", UserRole::Agent))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "read");
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications/unread-count")
        .insert_header(bearer("agent-1", UserRole::Agent))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["unreadCount"], 0);
}

#[actix_web::test]
async fn test_mark_all_read_with_mixed_states() {
    let state = memory_state();
    let user = UserId::parse("u1").unwrap();
    let mut ids = Vec::new();
    for _ in 0..7 {
        let new = NewNotification::new(
            user.clone(),
            UserRole::Buyer,
            presence_service::models::NotificationType::PriceChange,
            "Price change",
            "The price changed",
        );
        ids.push(state.dispatcher.create(new).await.unwrap().id);
    }
    state.dispatcher.mark_read(ids[0], &user).await.unwrap();
    state.dispatcher.mark_read(ids[1], &user).await.unwrap();

    let app = app!(state);
    let req = test::TestRequest::post()
        .uri("/api/v1/notifications/mark-all-read")
        .insert_header(bearer("u1", UserRole::Buyer))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["updated"], 5);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications?filter=read")
        .insert_header(bearer("u1", UserRole::Buyer))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["unreadCount"], 0);
    assert_eq!(body["data"]["pagination"]["total"], 7);
}

#[actix_web::test]
async fn test_snapshot_pagination_over_http() {
    let state = memory_state();
    let app = app!(state.clone());

    let create = |n: usize| {
        let state = state.clone();
        async move {
            for _ in 0..n {
                let new: NewNotification =
                    serde_json::from_value(assignment_body("agent-9")).unwrap();
                state.dispatcher.create(new).await.unwrap();
            }
        }
    };
    create(5).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications?limit=2")
        .insert_header(bearer("agent-9", UserRole::Agent))
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    let as_of = first["data"]["pagination"]["asOf"].as_i64().unwrap();
    assert_eq!(first["data"]["pagination"]["pages"], 3);

    create(3).await;

    let mut seen: HashSet<String> = first["data"]["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap().to_string())
        .collect();
    for page in 2..=3 {
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/notifications?limit=2&page={page}&asOf={as_of}"))
            .insert_header(bearer("agent-9", UserRole::Agent))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        for item in body["data"]["notifications"].as_array().unwrap() {
            assert!(seen.insert(item["id"].as_str().unwrap().to_string()));
        }
        assert_eq!(body["data"]["unreadCount"], 8);
    }
    assert_eq!(seen.len(), 5);
}

#[actix_web::test]
async fn test_cursor_pagination_over_http() {
    let state = memory_state();
    for _ in 0..5 {
        let new: NewNotification = serde_json::from_value(assignment_body("agent-4")).unwrap();
        state.dispatcher.create(new).await.unwrap();
    }
    let app = app!(state.clone());

    let mut uri = "/api/v1/notifications?limit=2".to_string();
    let mut seen: Vec<String> = Vec::new();
    loop {
        let req = test::TestRequest::get()
            .uri(&uri)
            .insert_header(bearer("agent-4", UserRole::Agent))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        seen.extend(
            body["data"]["notifications"]
                .as_array()
                .unwrap()
                .iter()
                .map(|n| n["id"].as_str().unwrap().to_string()),
        );

        // a new row between fetches must not shift the remaining pages
        let new: NewNotification = serde_json::from_value(assignment_body("agent-4")).unwrap();
        state.dispatcher.create(new).await.unwrap();

        let pagination = &body["data"]["pagination"];
        match pagination["nextCursor"].as_i64() {
            Some(cursor) => {
                uri = format!(
                    "/api/v1/notifications?limit=2&asOf={}&cursor={cursor}",
                    pagination["asOf"]
                )
            }
            None => break,
        }
    }

    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(seen.len(), 5);
    assert_eq!(unique.len(), 5);
}

#[actix_web::test]
async fn test_foreign_notification_is_not_found() {
    let state = memory_state();
    let (created, _) = state
        .dispatcher
        .create_and_dispatch(serde_json::from_value(assignment_body("agent-1")).unwrap())
        .await
        .unwrap();
    let app = app!(state);

    for req in [
        test::TestRequest::delete().uri(&format!("/api/v1/notifications/{}", created.id)),
        test::TestRequest::put().uri(&format!("/api/v1/notifications/{}/archive", created.id)),
    ] {
        let resp = test::call_service(
            &app,
            req.insert_header(bearer("intruder", UserRole::Buyer))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

#[actix_web::test]
async fn test_invalid_payloads_are_bad_requests() {
    let app = app!(memory_state());

    let mut body = assignment_body("agent-1");
    body["title"] = json!("   ");
    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .insert_header(internal())
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications?filter=starred")
        .insert_header(bearer("agent-1", UserRole::Agent))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_rejected_extractors_use_error_body() {
    let app = app!(memory_state());

    let requests = [
        test::TestRequest::get()
            .uri("/api/v1/notifications?page=-1")
            .insert_header(bearer("agent-1", UserRole::Agent)),
        test::TestRequest::put()
            .uri("/api/v1/notifications/not-a-uuid/read")
            .insert_header(bearer("agent-1", UserRole::Agent)),
        test::TestRequest::post()
            .uri("/api/v1/notifications")
            .insert_header(internal())
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json"),
    ];

    for req in requests {
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "VALIDATION");
        assert_eq!(body["retryable"], false);
    }
}

#[actix_web::test]
async fn test_online_target_receives_push_and_email_flag() {
    let state = memory_state();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handle = state.presence.on_connect(tx);
    state
        .presence
        .on_add_user(&mut handle, UserId::parse("agent-1").unwrap());
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .insert_header(internal())
        .set_json(assignment_body("agent-1"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["delivered"], true);
    assert!(rx.try_recv().is_ok());

    let id = body["data"]["notification"]["id"].as_str().unwrap();
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/notifications/{id}/email-sent"))
        .insert_header(internal())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["emailSent"], true);
}

#[actix_web::test]
async fn test_event_fanout_endpoint() {
    let app = app!(memory_state());

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications/events")
        .insert_header(internal())
        .set_json(json!({
            "event": "price_changed",
            "propertyId": "p-1",
            "oldPrice": 900000,
            "newPrice": 875000
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let targets: Vec<&str> = body["data"]["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["notification"]["targetUserId"].as_str().unwrap())
        .collect();
    assert_eq!(targets, vec!["seller-1", "buyer-1"]);

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications/events")
        .insert_header(internal())
        .set_json(json!({
            "event": "agent_assigned",
            "propertyId": "unknown",
            "agentId": "agent-1"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_presence_endpoints() {
    let state = memory_state();
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut handle = state.presence.on_connect(tx);
    state.presence.on_add_user(&mut handle, UserId::parse("42").unwrap());
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/v1/presence/42")
        .insert_header(bearer("7", UserRole::Buyer))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["online"], true);

    let req = test::TestRequest::get()
        .uri("/api/v1/presence/43")
        .insert_header(bearer("7", UserRole::Buyer))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["online"], false);

    let req = test::TestRequest::get()
        .uri("/api/v1/presence")
        .insert_header(internal())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["users"], json!(["42"]));
}

/// Store whose database is unreachable
struct UnavailableStore;

fn down<T>() -> AppResult<T> {
    Err(AppError::StoreUnavailable("pool timed out".into()))
}

#[async_trait]
impl NotificationStore for UnavailableStore {
    async fn insert(&self, _new: NewNotification) -> AppResult<Notification> {
        down()
    }
    async fn get(&self, _id: Uuid) -> AppResult<Option<Notification>> {
        down()
    }
    async fn list(&self, _user_id: &UserId, _query: &ListQuery) -> AppResult<ListWindow> {
        down()
    }
    async fn unread_count(&self, _user_id: &UserId) -> AppResult<u64> {
        down()
    }
    async fn mark_read(&self, _id: Uuid, _owner: &UserId) -> AppResult<Notification> {
        down()
    }
    async fn mark_all_read(&self, _owner: &UserId) -> AppResult<u64> {
        down()
    }
    async fn archive(&self, _id: Uuid, _owner: &UserId) -> AppResult<Notification> {
        down()
    }
    async fn remove(&self, _id: Uuid, _owner: &UserId) -> AppResult<Notification> {
        down()
    }
    async fn mark_email_sent(&self, _id: Uuid) -> AppResult<Notification> {
        down()
    }
    async fn purge_older_than(&self, _cutoff: DateTime<Utc>) -> AppResult<u64> {
        down()
    }
}

#[actix_web::test]
async fn test_store_outage_is_retryable_503() {
    let app = app!(state_with(Arc::new(UnavailableStore)));

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .insert_header(internal())
        .set_json(assignment_body("agent-1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["retryable"], true);
    assert_eq!(body["code"], "STORE_UNAVAILABLE");
}
