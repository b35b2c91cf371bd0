//! Order submission: wire payloads, persistence and the placement service.
pub mod memory;
pub mod payload;
pub mod repository;
pub mod service;

pub use memory::InMemoryOrderRepository;
pub use payload::{CreateOrderRequest, CreateOrderResponse, OrderLinePayload, OrderReceipt};
pub use repository::{MockOrderRepository, OrderRepository, PgOrderRepository, Placement, RepositoryError};
pub use service::{OrderService, PlacedOrder};
