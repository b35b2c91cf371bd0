//! Storefront checkout core
//!
//! The pieces of a storefront that carry state between the shopper and the
//! order book.
//!
//! ## Features
//! - Price formatting for whole-unit currency amounts
//! - Cart store with merge-on-add line items and persisted snapshots
//! - Order submission with validation, guest or signed-in attribution and
//!   idempotent retries
//! - Stock decrement in the same transaction as the order insert
//! - Best-effort confirmation email

use thiserror::Error;

pub mod cart_store;
pub mod config;
pub mod domain;
pub mod http;
pub mod identity;
pub mod notifications;
pub mod orders;

pub use cart_store::{CartStore, CheckoutDetails};
pub use config::AppConfig;
pub use domain::aggregates::{Cart, CartItem, Order, OrderStatus, PaymentStatus, ShippingAddress};
pub use domain::value_objects::{format_price, Money};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("{0}")]
    Validation(String),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Idempotency key was already used for a different order")]
    IdempotencyKeyReused,

    #[error("Order storage error: {0}")]
    Repository(#[from] orders::RepositoryError),

    #[error("Identity lookup error: {0}")]
    Session(#[from] identity::SessionError),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
