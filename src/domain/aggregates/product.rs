//! Product Aggregate

use serde::{Deserialize, Serialize};

/// Tracked inventory count. `None` means the product's stock is not tracked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel(Option<i32>);

impl StockLevel {
    pub fn untracked() -> Self { Self(None) }
    pub fn tracked(quantity: i32) -> Self { Self(Some(quantity.max(0))) }
    pub fn quantity(&self) -> Option<i32> { self.0 }
    pub fn is_tracked(&self) -> bool { self.0.is_some() }
    pub fn is_in_stock(&self) -> bool { self.0.map_or(true, |q| q > 0) }

    /// Removes `by` units, never going below zero. Untracked stock is unchanged.
    pub fn decrement(self, by: u32) -> Self {
        let by = i32::try_from(by).unwrap_or(i32::MAX);
        Self(self.0.map(|q| q.saturating_sub(by).max(0)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub stock: StockLevel,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: i64, stock: StockLevel) -> Self {
        Self { id: id.into(), name: name.into(), price, stock }
    }

    pub fn remove_inventory(&mut self, qty: u32) { self.stock = self.stock.decrement(qty); }
}
