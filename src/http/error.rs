use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

use crate::StorefrontError;

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(message) => {
                tracing::warn!(error = %message, "rejected order payload");
                (StatusCode::BAD_REQUEST, message.clone())
            }
            Self::OrderNotFound => (StatusCode::NOT_FOUND, "Order not found".to_string()),
            Self::IdempotencyKeyReused => (StatusCode::CONFLICT, self.to_string()),
            Self::Repository(e) => {
                tracing::error!(error = %e, source = ?std::error::Error::source(e), "order storage failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create order".to_string())
            }
            Self::Session(e) => {
                tracing::error!(error = %e, source = ?std::error::Error::source(e), "identity lookup failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create order".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
