//! Order handlers.

use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::AppState;
use crate::domain::aggregates::Order;
use crate::identity::{self, Credentials};
use crate::orders::{CreateOrderRequest, CreateOrderResponse};
use crate::StorefrontError;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// `POST /api/v1/orders`
#[instrument(name = "handler::create_order", skip_all)]
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), StorefrontError> {
    let Json(mut request) = payload.map_err(|rejection| StorefrontError::Validation(rejection.body_text()))?;
    if let Some(key) = headers.get(IDEMPOTENCY_KEY_HEADER).and_then(|v| v.to_str().ok()).filter(|v| !v.trim().is_empty()) {
        request.idempotency_key = Some(key.trim().to_string());
    }
    let draft = request.into_draft()?;

    let credentials = Credentials::from_headers(&headers, &state.session_cookie);
    let identity = identity::resolve(state.sessions.as_ref(), &credentials).await?;
    info!(?identity, "placing order");

    let placed = state.orders.place_order(draft, identity.user_id()).await?;
    let status = if placed.replayed { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(CreateOrderResponse::from(&placed.order))))
}

/// `GET /api/v1/orders/:id`
pub async fn get_order(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Order>, StorefrontError> {
    let Path(id) = id.map_err(|rejection| {
        debug!(rejection = %rejection.body_text(), "unparseable order id");
        StorefrontError::Validation("order id must be a UUID".to_string())
    })?;
    state.orders.get_order(id).await.map(Json)
}
