//! Cart store: the single owner of the shopping cart for a client session.
//!
//! A [`CartStore`] is opened once against a [`CartStorage`] slot, mutated only
//! through `add_item`, `update_quantity`, `remove_item` and `clear`, and closed
//! when the session ends. Every mutation completes in memory first and then
//! hands a snapshot to a background writer; the in-memory cart is always
//! authoritative and storage is only read back on the next `open`.

mod storage;

pub use storage::{CartStorage, FileCartStorage, MemoryCartStorage, MockCartStorage, StorageError};

use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartItem, PaymentStatus, QuantityUpdate, ShippingAddress};
use crate::domain::events::CartEvent;
use crate::orders::payload::{CreateOrderRequest, OrderLinePayload};

/// Customer and delivery details collected by the checkout form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CheckoutDetails {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub shipping_address: ShippingAddress,
    pub shipping_cost: i64,
    pub notes: Option<String>,
    pub payment_method: String,
    pub payment_status: Option<PaymentStatus>,
}

pub struct CartStore {
    cart: Cart,
    events: Vec<CartEvent>,
    snapshots: watch::Sender<Vec<CartItem>>,
    writer: JoinHandle<()>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore").field("cart", &self.cart).field("pending_events", &self.events.len()).finish()
    }
}

impl CartStore {
    /// Loads the persisted cart and starts the writer. A missing, unreadable or
    /// malformed blob yields an empty cart.
    #[instrument(name = "cart_store::open", skip(storage))]
    pub async fn open(storage: Arc<dyn CartStorage>) -> Self {
        let cart = rehydrate(storage.as_ref()).await;
        debug!(items = cart.items().len(), "cart rehydrated");
        let (snapshots, updates) = watch::channel(cart.items().to_vec());
        let writer = tokio::spawn(write_snapshots(storage, updates));
        Self { cart, events: Vec::new(), snapshots, writer }
    }

    pub fn cart(&self) -> &Cart { &self.cart }
    pub fn items(&self) -> &[CartItem] { self.cart.items() }
    pub fn subtotal(&self) -> i64 { self.cart.subtotal() }
    pub fn item_count(&self) -> u64 { self.cart.item_count() }
    pub fn is_empty(&self) -> bool { self.cart.is_empty() }

    pub fn add_item(&mut self, item: CartItem) {
        let event = CartEvent::ItemAdded {
            product_id: item.product_id.clone(),
            variant_id: item.variant_id.clone(),
            name: item.name.clone(),
            quantity: item.quantity.max(1),
        };
        self.cart.add_item(item);
        self.events.push(event);
        self.persist();
    }

    pub fn update_quantity(&mut self, product_id: &str, quantity: i64, variant_id: Option<&str>) {
        match self.cart.update_quantity(product_id, quantity, variant_id) {
            QuantityUpdate::Set(quantity) => self.events.push(CartEvent::QuantityUpdated {
                product_id: product_id.to_string(),
                variant_id: variant_id.map(str::to_string),
                quantity,
            }),
            QuantityUpdate::Removed(item) => self.events.push(CartEvent::ItemRemoved {
                product_id: item.product_id,
                variant_id: item.variant_id,
            }),
            QuantityUpdate::NotFound => debug!(product_id, ?variant_id, "quantity update for an item not in the cart"),
        }
        self.persist();
    }

    pub fn remove_item(&mut self, product_id: &str, variant_id: Option<&str>) {
        if let Some(item) = self.cart.remove_item(product_id, variant_id) {
            self.events.push(CartEvent::ItemRemoved { product_id: item.product_id, variant_id: item.variant_id });
        }
        self.persist();
    }

    pub fn clear(&mut self) {
        self.cart.clear();
        self.events.push(CartEvent::Cleared);
        self.persist();
    }

    pub fn take_events(&mut self) -> Vec<CartEvent> { std::mem::take(&mut self.events) }

    /// Builds the order submission for the current cart. Each call is a new
    /// checkout attempt with its own idempotency key; resend the same request
    /// to retry an attempt. The cart itself is left untouched.
    pub fn checkout_request(&self, details: CheckoutDetails) -> CreateOrderRequest {
        let subtotal = self.cart.subtotal();
        CreateOrderRequest {
            items: self.cart.items().iter().map(OrderLinePayload::from).collect(),
            subtotal,
            shipping_cost: details.shipping_cost,
            total: subtotal.saturating_add(details.shipping_cost),
            customer_name: Some(details.customer_name),
            customer_phone: Some(details.customer_phone),
            customer_email: details.customer_email,
            shipping_address: Some(details.shipping_address),
            notes: details.notes,
            payment_method: Some(details.payment_method),
            payment_status: details.payment_status.map(|status| status.as_str().to_string()),
            idempotency_key: Some(Uuid::new_v4().to_string()),
        }
    }

    /// Stops the writer after it has stored the latest snapshot.
    pub async fn close(self) {
        drop(self.snapshots);
        if let Err(e) = self.writer.await {
            warn!(error = %e, "cart writer task ended abnormally");
        }
    }

    fn persist(&self) {
        self.snapshots.send_replace(self.cart.items().to_vec());
    }
}

async fn rehydrate(storage: &dyn CartStorage) -> Cart {
    match storage.load().await {
        Ok(None) => Cart::new(),
        Ok(Some(blob)) => match serde_json::from_str::<Vec<CartItem>>(&blob) {
            Ok(items) => Cart::from_items(items),
            Err(e) => {
                warn!(error = %e, "discarding malformed persisted cart");
                Cart::new()
            }
        },
        Err(e) => {
            warn!(error = %e, "could not read persisted cart, starting empty");
            Cart::new()
        }
    }
}

async fn write_snapshots(storage: Arc<dyn CartStorage>, mut updates: watch::Receiver<Vec<CartItem>>) {
    while updates.changed().await.is_ok() {
        let items = updates.borrow_and_update().clone();
        let blob = match serde_json::to_string(&items) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "could not serialize cart snapshot");
                continue;
            }
        };
        if let Err(e) = storage.save(blob).await {
            warn!(error = %e, "could not persist cart snapshot");
        }
    }
}
