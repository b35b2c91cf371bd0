//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Product, StockLevel};
pub use order::{AmountOverflow, Order, OrderDraft, OrderLineItem, OrderNumber, OrderStatus, PaymentStatus, ShippingAddress, UnknownStatus, MAX_AMOUNT};
pub use cart::{Cart, CartItem, QuantityUpdate};
