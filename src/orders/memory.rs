//! In-memory order and stock storage, used when no database is configured.

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::repository::{OrderRepository, Placement, RepositoryError};
use crate::domain::aggregates::{Order, Product};

#[derive(Debug, Default)]
struct State {
    products: HashMap<String, Product>,
    orders: Vec<Order>,
    keys: HashMap<String, Uuid>,
}

/// Clones share the same state. The whole placement runs under one lock, so it
/// is atomic with respect to other placements.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self { Self::default() }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self { state: Arc::new(Mutex::new(State { products, ..State::default() })) }
    }

    pub async fn upsert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id.clone(), product);
    }

    pub async fn product(&self, id: &str) -> Option<Product> { self.state.lock().await.products.get(id).cloned() }

    pub async fn orders(&self) -> Vec<Order> { self.state.lock().await.orders.clone() }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn place_order(&self, order: &Order) -> Result<Placement, RepositoryError> {
        let mut state = self.state.lock().await;

        if let Some(key) = order.idempotency_key.as_deref() {
            if let Some(id) = state.keys.get(key).copied() {
                let existing = state.orders.iter().find(|o| o.id == id).cloned().ok_or(RepositoryError::Conflict)?;
                return Placement::replay(existing, order);
            }
        }
        if state.orders.iter().any(|o| o.id == order.id) {
            return Err(RepositoryError::Conflict);
        }

        for item in &order.items {
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product.remove_inventory(item.quantity);
            }
        }
        if let Some(key) = order.idempotency_key.clone() {
            state.keys.insert(key, order.id);
        }
        state.orders.push(order.clone());
        Ok(Placement::Created(order.clone()))
    }

    async fn get_order(&self, id: Uuid) -> Result<Order, RepositoryError> {
        self.state.lock().await.orders.iter().find(|o| o.id == id).cloned().ok_or(RepositoryError::NotFound)
    }
}
