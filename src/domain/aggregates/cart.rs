//! Cart Aggregate

use serde::{Deserialize, Serialize};

fn default_quantity() -> u32 { 1 }

/// One cart line. Name, price and image are the catalog snapshot taken when the
/// item was first added.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    pub name: String,
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, name: impl Into<String>, price: i64) -> Self {
        Self { product_id: product_id.into(), variant_id: None, name: name.into(), price, image: None, quantity: 1 }
    }

    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self { self.variant_id = Some(variant_id.into()); self }
    pub fn with_image(mut self, image: impl Into<String>) -> Self { self.image = Some(image.into()); self }
    pub fn with_quantity(mut self, quantity: u32) -> Self { self.quantity = quantity; self }

    pub fn line_total(&self) -> i64 { self.price.saturating_mul(i64::from(self.quantity)) }

    pub fn matches(&self, product_id: &str, variant_id: Option<&str>) -> bool {
        self.product_id == product_id && self.variant_id.as_deref() == variant_id
    }
}

/// Outcome of [`Cart::update_quantity`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuantityUpdate {
    Set(u32),
    Removed(CartItem),
    NotFound,
}

/// Ordered list of line items. Totals are derived from the items on every read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    /// Rebuilds a cart through `add_item`, so duplicate keys are merged and
    /// zero quantities count as one.
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::new();
        for item in items { cart.add_item(item); }
        cart
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn subtotal(&self) -> i64 { self.items.iter().fold(0i64, |acc, item| acc.saturating_add(item.line_total())) }
    pub fn item_count(&self) -> u64 { self.items.iter().map(|i| u64::from(i.quantity)).sum() }

    pub fn find(&self, product_id: &str, variant_id: Option<&str>) -> Option<&CartItem> {
        self.items.iter().find(|i| i.matches(product_id, variant_id))
    }

    pub fn add_item(&mut self, mut item: CartItem) {
        item.quantity = item.quantity.max(1);
        let variant_id = item.variant_id.clone();
        if let Some(existing) = self.items.iter_mut().find(|i| i.matches(&item.product_id, variant_id.as_deref())) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
    }

    /// Sets the quantity exactly. A target of zero or less removes the line;
    /// an unknown key is left alone.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64, variant_id: Option<&str>) -> QuantityUpdate {
        let Some(pos) = self.position(product_id, variant_id) else { return QuantityUpdate::NotFound };
        if quantity <= 0 {
            return QuantityUpdate::Removed(self.items.remove(pos));
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(item) = self.items.get_mut(pos) { item.quantity = quantity; }
        QuantityUpdate::Set(quantity)
    }

    pub fn remove_item(&mut self, product_id: &str, variant_id: Option<&str>) -> Option<CartItem> {
        self.position(product_id, variant_id).map(|pos| self.items.remove(pos))
    }

    pub fn clear(&mut self) { self.items.clear(); }

    fn position(&self, product_id: &str, variant_id: Option<&str>) -> Option<usize> {
        self.items.iter().position(|i| i.matches(product_id, variant_id))
    }
}
