//! HTTP surface: router, shared state and handlers.
mod error;
pub mod orders;

use axum::{routing::{get, post}, Json, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::identity::SessionStore;
use crate::orders::OrderService;

#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub sessions: Arc<dyn SessionStore>,
    pub session_cookie: Arc<str>,
}

impl AppState {
    pub fn new(orders: OrderService, sessions: Arc<dyn SessionStore>, session_cookie: &str) -> Self {
        Self { orders, sessions, session_cookie: Arc::from(session_cookie) }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .route("/api/v1/orders", post(orders::create_order))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
