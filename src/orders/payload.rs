//! Wire format of the order submission endpoint.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::domain::aggregates::{CartItem, Order, OrderDraft, OrderLineItem, PaymentStatus, ShippingAddress};
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderLinePayload {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 0, max = 1000000000000))]
    pub price: i64,
    #[validate(range(min = 1))]
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&CartItem> for OrderLinePayload {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            variant_id: item.variant_id.clone(),
            name: item.name.clone(),
            price: item.price,
            quantity: i64::from(item.quantity),
            image: item.image.clone(),
        }
    }
}

/// Body of `POST /api/v1/orders`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub items: Vec<OrderLinePayload>,
    #[serde(default)]
    pub subtotal: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = 1000000000000))]
    pub shipping_cost: i64,
    #[serde(default)]
    pub total: i64,
    #[validate(required, length(min = 1))]
    pub customer_name: Option<String>,
    #[validate(required, length(min = 1))]
    pub customer_phone: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate(required)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[validate(required, length(min = 1))]
    pub payment_method: Option<String>,
    /// Free-form; only "paid" (any case) marks the order as paid up front.
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl CreateOrderRequest {
    /// Checks the payload and turns it into an [`OrderDraft`]. Every failure is a
    /// [`StorefrontError::Validation`] naming the offending field.
    pub fn into_draft(self) -> Result<OrderDraft> {
        self.validate().map_err(|e| StorefrontError::Validation(describe(&e, "")))?;
        let mut items = Vec::with_capacity(self.items.len());
        for (index, line) in self.items.into_iter().enumerate() {
            line.validate().map_err(|e| StorefrontError::Validation(describe(&e, &format!("items[{index}]."))))?;
            let quantity = u32::try_from(line.quantity)
                .map_err(|_| StorefrontError::Validation(format!("items[{index}].quantity is out of range")))?;
            let mut item = OrderLineItem::new(line.product_id, line.name, line.price, quantity);
            item.variant_id = line.variant_id;
            item.image = line.image;
            items.push(item);
        }

        let shipping_address = self.shipping_address.ok_or_else(|| missing("shippingAddress"))?;
        if shipping_address.address.trim().is_empty() { return Err(missing("shippingAddress.address")); }
        if shipping_address.city.trim().is_empty() { return Err(missing("shippingAddress.city")); }

        Ok(OrderDraft {
            items,
            claimed_subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            claimed_total: self.total,
            customer_name: required_text(self.customer_name, "customerName")?,
            customer_phone: required_text(self.customer_phone, "customerPhone")?,
            customer_email: self.customer_email,
            shipping_address,
            notes: self.notes,
            payment_method: required_text(self.payment_method, "paymentMethod")?,
            payment_status: self.payment_status.as_deref().map(PaymentStatus::from_submitted).unwrap_or_default(),
            idempotency_key: self.idempotency_key.filter(|key| !key.trim().is_empty()),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub id: Uuid,
    pub order_number: String,
}

/// Success body: `{ "success": true, "order": { "id", "orderNumber" } }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order: OrderReceipt,
}

impl From<&Order> for CreateOrderResponse {
    fn from(order: &Order) -> Self {
        Self { success: true, order: OrderReceipt { id: order.id, order_number: order.order_number.clone() } }
    }
}

fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn missing(field: &str) -> StorefrontError { StorefrontError::Validation(format!("{field} is required")) }

fn required_text(value: Option<String>, field: &str) -> Result<String> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| missing(field))
}

fn describe(errors: &ValidationErrors, prefix: &str) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(field, _)| *field);
    let messages: Vec<String> = fields.into_iter().map(|(field, errs)| {
        let name = format!("{prefix}{}", camel_case(field));
        match errs.first().map(|e| &*e.code) {
            Some("required") => format!("{name} is required"),
            Some("length") => format!("{name} must not be empty"),
            Some("range") => format!("{name} is out of range"),
            Some("email") => format!("{name} is not a valid email address"),
            _ => format!("{name} is invalid"),
        }
    }).collect();
    if messages.is_empty() { "invalid order payload".to_string() } else { messages.join("; ") }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for ch in field.chars() {
        if ch == '_' { upper = true; continue; }
        if upper { out.extend(ch.to_uppercase()); upper = false; } else { out.push(ch); }
    }
    out
}
