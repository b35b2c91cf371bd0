//! Domain events
use uuid::Uuid;

/// Acknowledgements raised by cart mutations; the UI turns these into toasts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartEvent {
    ItemAdded { product_id: String, variant_id: Option<String>, name: String, quantity: u32 },
    QuantityUpdated { product_id: String, variant_id: Option<String>, quantity: u32 },
    ItemRemoved { product_id: String, variant_id: Option<String> },
    Cleared,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_number: String, user_id: Option<Uuid>, total: i64 },
}
