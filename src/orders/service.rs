//! Order placement service.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::repository::{OrderRepository, Placement, RepositoryError};
use crate::domain::aggregates::{Order, OrderDraft, OrderNumber};
use crate::notifications::Mailer;
use crate::{Result, StorefrontError};

/// Outcome of a checkout submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order: Order,
    /// `true` when an earlier submission with the same idempotency key was returned.
    pub replayed: bool,
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    mailer: Arc<dyn Mailer>,
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.debug_struct("OrderService").finish_non_exhaustive() }
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepository>, mailer: Arc<dyn Mailer>) -> Self { Self { orders, mailer } }

    /// Records the order together with its stock decrements, then sends the
    /// confirmation email when the customer gave an address.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::Validation`] if the totals overflow,
    /// [`StorefrontError::IdempotencyKeyReused`] if another customer's order
    /// already holds the key, and [`StorefrontError::Repository`] if the order
    /// could not be stored. In every case no stock was changed. Email failures
    /// are logged only.
    #[instrument(name = "order_service::place_order", skip_all, fields(user_id = ?user_id, lines = draft.items.len()))]
    pub async fn place_order(&self, draft: OrderDraft, user_id: Option<Uuid>) -> Result<PlacedOrder> {
        let (claimed_subtotal, claimed_total) = (draft.claimed_subtotal, draft.claimed_total);
        let order = Order::place(draft, user_id, OrderNumber::generate())
            .map_err(|e| StorefrontError::Validation(e.to_string()))?;
        if claimed_subtotal != order.subtotal || claimed_total != order.total {
            warn!(
                order_number = %order.order_number,
                claimed_subtotal, claimed_total, subtotal = order.subtotal, total = order.total,
                "client totals disagree with line items, storing recomputed totals"
            );
        }

        let placement = self.orders.place_order(&order).await.map_err(|e| match e {
            RepositoryError::KeyReused => {
                warn!(order_number = %order.order_number, "idempotency key already used by another customer");
                StorefrontError::IdempotencyKeyReused
            }
            other => {
                error!(order_number = %order.order_number, error = %other, "failed to store order");
                StorefrontError::Repository(other)
            }
        })?;

        let order = match placement {
            Placement::Replayed(existing) => {
                info!(order_number = %existing.order_number, "duplicate checkout submission, returning existing order");
                return Ok(PlacedOrder { order: existing, replayed: true });
            }
            Placement::Created(order) => order,
        };
        info!(event = ?order.placed_event(), status = order.status.as_str(), "order placed");

        if let Some(email) = order.customer_email.as_deref() {
            if let Err(e) = self.mailer.send_order_confirmation(email, &order).await {
                warn!(order_number = %order.order_number, error = %e, "confirmation email not sent");
            }
        }

        Ok(PlacedOrder { order, replayed: false })
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order> {
        self.orders.get_order(id).await.map_err(|e| match e {
            RepositoryError::NotFound => StorefrontError::OrderNotFound,
            other => StorefrontError::Repository(other),
        })
    }
}
