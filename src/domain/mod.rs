//! Domain model: cart, orders, stock and money.
pub mod aggregates;
pub mod events;
pub mod value_objects;
