//! Order persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use sqlx::{error::ErrorKind, postgres::PgPool, types::Json, FromRow, Postgres, Transaction};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderLineItem, ShippingAddress, UnknownStatus};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("order not found")]
    NotFound,

    #[error("conflicting order record")]
    Conflict,

    #[error("idempotency key belongs to another customer's order")]
    KeyReused,

    #[error("stored order is unreadable: {0}")]
    Corrupt(String),

    #[error("storage error")]
    Sql(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        if matches!(error, sqlx::Error::RowNotFound) {
            return Self::NotFound;
        }
        match error.as_database_error().map(|e| e.kind()) {
            Some(ErrorKind::UniqueViolation) => Self::Conflict,
            _ => Self::Sql(error),
        }
    }
}

impl From<UnknownStatus> for RepositoryError {
    fn from(error: UnknownStatus) -> Self { Self::Corrupt(error.to_string()) }
}

/// Result of [`OrderRepository::place_order`].
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// The order was stored and its stock decrements applied.
    Created(Order),
    /// An order with the same idempotency key already existed; nothing changed.
    Replayed(Order),
}

impl Placement {
    /// Replays an existing order for `incoming`, refusing when the stored
    /// order belongs to a different customer.
    pub fn replay(existing: Order, incoming: &Order) -> Result<Self, RepositoryError> {
        if existing.user_id != incoming.user_id {
            return Err(RepositoryError::KeyReused);
        }
        Ok(Self::Replayed(existing))
    }
}

#[automock]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stores the order and applies every line's stock decrement as one unit:
    /// either all of it is committed or none of it is. Tracked stock is floored
    /// at zero and untracked stock is left alone. An idempotency key already
    /// held by another customer's order yields [`RepositoryError::KeyReused`].
    async fn place_order(&self, order: &Order) -> Result<Placement, RepositoryError>;

    /// Retrieve a single order.
    async fn get_order(&self, id: Uuid) -> Result<Order, RepositoryError>;
}

const INSERT_ORDER_SQL: &str = "INSERT INTO orders (id, order_number, user_id, items, subtotal, shipping_cost, discount, total, customer_name, customer_phone, customer_email, shipping_address, payment_method, payment_status, status, notes, idempotency_key, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)";
const DECREMENT_STOCK_SQL: &str = "UPDATE products SET quantity = GREATEST(quantity - $2, 0), updated_at = NOW() WHERE id = $1 AND quantity IS NOT NULL";
const SELECT_ORDER_SQL: &str = "SELECT * FROM orders WHERE id = $1";
const SELECT_ORDER_BY_KEY_SQL: &str = "SELECT * FROM orders WHERE idempotency_key = $1";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Option<Uuid>,
    items: Json<Vec<OrderLineItem>>,
    subtotal: i64,
    shipping_cost: i64,
    discount: i64,
    total: i64,
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    payment_status: String,
    status: String,
    notes: Option<String>,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            items: row.items.0,
            subtotal: row.subtotal,
            shipping_cost: row.shipping_cost,
            discount: row.discount,
            total: row.total,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            customer_email: row.customer_email,
            shipping_address: row.shipping_address.0,
            payment_method: row.payment_method,
            payment_status: row.payment_status.parse()?,
            status: row.status.parse()?,
            notes: row.notes,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    async fn find_by_key(&self, key: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(SELECT_ORDER_BY_KEY_SQL).bind(key).fetch_optional(&self.pool).await?;
        row.map(Order::try_from).transpose()
    }

    async fn insert_with_stock(&self, order: &Order) -> Result<Placement, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(key) = order.idempotency_key.as_deref() {
            let existing = sqlx::query_as::<_, OrderRow>(SELECT_ORDER_BY_KEY_SQL).bind(key).fetch_optional(&mut *tx).await?;
            if let Some(row) = existing {
                tx.commit().await?;
                return Placement::replay(row.try_into()?, order);
            }
        }

        sqlx::query(INSERT_ORDER_SQL)
            .bind(order.id).bind(&order.order_number).bind(order.user_id).bind(Json(&order.items))
            .bind(order.subtotal).bind(order.shipping_cost).bind(order.discount).bind(order.total)
            .bind(&order.customer_name).bind(&order.customer_phone).bind(&order.customer_email)
            .bind(Json(&order.shipping_address)).bind(&order.payment_method)
            .bind(order.payment_status.as_str()).bind(order.status.as_str()).bind(&order.notes)
            .bind(&order.idempotency_key).bind(order.created_at)
            .execute(&mut *tx).await?;

        decrement_stock(&mut tx, &order.items).await?;

        tx.commit().await?;
        Ok(Placement::Created(order.clone()))
    }
}

async fn decrement_stock(tx: &mut Transaction<'_, Postgres>, items: &[OrderLineItem]) -> Result<(), RepositoryError> {
    for item in items {
        let by = i32::try_from(item.quantity).unwrap_or(i32::MAX);
        let result = sqlx::query(DECREMENT_STOCK_SQL).bind(&item.product_id).bind(by).execute(&mut **tx).await?;
        if result.rows_affected() == 0 {
            debug!(product_id = %item.product_id, "stock not tracked for product");
        }
    }
    Ok(())
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn place_order(&self, order: &Order) -> Result<Placement, RepositoryError> {
        match self.insert_with_stock(order).await {
            // Another request with the same key committed between our lookup and insert.
            Err(RepositoryError::Conflict) if order.idempotency_key.is_some() => {
                let key = order.idempotency_key.as_deref().unwrap_or_default();
                let existing = self.find_by_key(key).await?.ok_or(RepositoryError::Conflict)?;
                Placement::replay(existing, order)
            }
            other => other,
        }
    }

    async fn get_order(&self, id: Uuid) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(SELECT_ORDER_SQL).bind(id).fetch_one(&self.pool).await?.try_into()
    }
}
