//! Order Aggregate

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use crate::domain::events::OrderEvent;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Refunded }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Refunded }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Processing => "processing",
            Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Cancelled => "cancelled", Self::Refunded => "refunded",
        }
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Paid => "paid", Self::Failed => "failed", Self::Refunded => "refunded" }
    }

    /// Reads a client-supplied payment status. Known values match ignoring case
    /// and surrounding whitespace; anything else counts as pending.
    pub fn from_submitted(value: &str) -> Self {
        value.trim().to_ascii_lowercase().parse().unwrap_or_default()
    }

    /// Paid orders start confirmed; anything else (cash on delivery included) starts pending.
    pub fn initial_order_status(&self) -> OrderStatus {
        match self { Self::Paid => OrderStatus::Confirmed, _ => OrderStatus::Pending }
    }
}

/// Largest price or shipping cost accepted on a submission, in whole units.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)] pub struct AmountOverflow;
impl std::error::Error for AmountOverflow {}
impl fmt::Display for AmountOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("order total is out of range") }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownStatus(pub String);
impl std::error::Error for UnknownStatus {}
impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "unknown status '{}'", self.0) }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending), "confirmed" => Ok(Self::Confirmed), "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped), "delivered" => Ok(Self::Delivered), "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded), other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending), "paid" => Ok(Self::Paid), "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded), other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Delivery address. Keys beyond `address` and `city` are kept as sent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ShippingAddress {
    pub fn new(address: impl Into<String>, city: impl Into<String>) -> Self {
        Self { address: address.into(), city: city.into(), extra: serde_json::Map::new() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    pub name: String,
    pub price: i64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub total: i64,
}

impl OrderLineItem {
    pub fn new(product_id: impl Into<String>, name: impl Into<String>, price: i64, quantity: u32) -> Self {
        Self { product_id: product_id.into(), variant_id: None, name: name.into(), price, quantity, image: None, total: price.saturating_mul(i64::from(quantity)) }
    }
}

/// Customer-facing reference: `ORD-` followed by the creation time in unix
/// milliseconds and a four digit random suffix.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const PREFIX: &'static str = "ORD-";
    const DIGITS: usize = 17;

    pub fn generate() -> Self { Self::generate_at(Utc::now(), &mut rand::thread_rng()) }

    pub fn generate_at(now: DateTime<Utc>, rng: &mut impl Rng) -> Self {
        let suffix: u16 = rng.gen_range(0..10_000);
        Self(format!("{}{:013}{:04}", Self::PREFIX, now.timestamp_millis().max(0), suffix))
    }

    pub fn is_well_formed(value: &str) -> bool {
        value.strip_prefix(Self::PREFIX).is_some_and(|digits| digits.len() == Self::DIGITS && digits.bytes().all(|b| b.is_ascii_digit()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_string(self) -> String { self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Validated checkout submission, before identity and numbering are attached.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderDraft {
    pub items: Vec<OrderLineItem>,
    pub claimed_subtotal: i64,
    pub shipping_cost: i64,
    pub claimed_total: i64,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub idempotency_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub items: Vec<OrderLineItem>,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub discount: i64,
    pub total: i64,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Builds the order record. Line totals, subtotal and total are computed
    /// here from the items; the draft's claimed figures are not trusted.
    ///
    /// Fails with [`AmountOverflow`] when any line total, the subtotal or the
    /// total does not fit in an `i64`.
    pub fn place(draft: OrderDraft, user_id: Option<Uuid>, order_number: OrderNumber) -> Result<Self, AmountOverflow> {
        let items = draft.items.into_iter()
            .map(|mut item| {
                item.total = item.price.checked_mul(i64::from(item.quantity)).ok_or(AmountOverflow)?;
                Ok(item)
            })
            .collect::<Result<Vec<OrderLineItem>, AmountOverflow>>()?;
        let subtotal = items.iter().try_fold(0i64, |acc, i| acc.checked_add(i.total)).ok_or(AmountOverflow)?;
        let discount = 0;
        let total = subtotal.checked_add(draft.shipping_cost).and_then(|t| t.checked_sub(discount)).ok_or(AmountOverflow)?;
        Ok(Self {
            id: Uuid::now_v7(), order_number: order_number.into_string(), user_id, items,
            subtotal, shipping_cost: draft.shipping_cost, discount, total,
            customer_name: draft.customer_name, customer_phone: draft.customer_phone, customer_email: draft.customer_email,
            shipping_address: draft.shipping_address, payment_method: draft.payment_method,
            payment_status: draft.payment_status, status: draft.payment_status.initial_order_status(),
            notes: draft.notes, idempotency_key: draft.idempotency_key, created_at: Utc::now(),
        })
    }

    pub fn is_guest(&self) -> bool { self.user_id.is_none() }
    pub fn item_count(&self) -> u64 { self.items.iter().map(|i| u64::from(i.quantity)).sum() }

    pub fn placed_event(&self) -> OrderEvent {
        OrderEvent::Placed { order_id: self.id, order_number: self.order_number.clone(), user_id: self.user_id, total: self.total }
    }
}
