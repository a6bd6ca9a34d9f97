//! Real-time presence & notification relay.
//!
//! Keeps every logical user reachable through one live WebSocket connection,
//! relays direct chat between buyers, sellers and agents, and turns business
//! events into durable notifications that are pushed when the target is online
//! and polled otherwise.

pub mod collaborators;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod presence;
pub mod relay;
pub mod services;
pub mod state;
pub mod store;
pub mod websocket;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;

use actix_web::web;

/// Mount every route of the service
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(|| async { "OK" }))
        .route("/metrics", web::get().to(metrics::serve_metrics))
        .route("/ws", web::get().to(websocket::ws_index))
        .configure(handlers::register_extractor_errors)
        .configure(handlers::register_notifications)
        .configure(handlers::register_presence);
}
