//! Order confirmation email.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::aggregates::Order;
use crate::domain::value_objects::format_price;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

#[automock]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends the confirmation for `order` to `to`.
    async fn send_order_confirmation(&self, to: &str, order: &Order) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationEmail {
    pub subject: String,
    pub html_body: String,
}

pub fn render_confirmation(order: &Order, store_name: &str, currency: &str) -> ConfirmationEmail {
    let rows: String = order.items.iter().map(|item| {
        format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&item.name), item.quantity, format_price(item.total, currency)
        )
    }).collect();
    let html_body = format!(
        "<h1>Thank you for your order, {name}!</h1>\
         <p>Order number: <strong>{number}</strong></p>\
         <table>{rows}</table>\
         <p>Subtotal: {subtotal}<br>Shipping: {shipping}<br><strong>Total: {total}</strong></p>\
         <p>Delivering to: {address}, {city}</p>",
        name = escape(&order.customer_name),
        number = order.order_number,
        subtotal = format_price(order.subtotal, currency),
        shipping = format_price(order.shipping_cost, currency),
        total = format_price(order.total, currency),
        address = escape(&order.shipping_address.address),
        city = escape(&order.shipping_address.city),
    );
    ConfirmationEmail { subject: format!("{store_name} order {} confirmed", order.order_number), html_body }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Renders the email and records the send in the log instead of talking to a
/// mail server.
#[derive(Debug, Clone)]
pub struct LogMailer {
    sender: String,
    store_name: String,
    currency: String,
}

impl LogMailer {
    pub fn new(sender: impl Into<String>, store_name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self { sender: sender.into(), store_name: store_name.into(), currency: currency.into() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.email_sender, &config.store_name, &config.store_currency)
    }
}

#[async_trait]
impl Mailer for LogMailer {
    #[instrument(name = "mailer::send_order_confirmation", skip(self, order), fields(order_number = %order.order_number))]
    async fn send_order_confirmation(&self, to: &str, order: &Order) -> Result<(), NotificationError> {
        if to.trim().is_empty() {
            return Err(NotificationError::Delivery("empty recipient".to_string()));
        }
        let email = render_confirmation(order, &self.store_name, &self.currency);
        let message_id = format!("log_email_{}", Uuid::new_v4());
        info!(to, from = %self.sender, subject = %email.subject, body_len = email.html_body.len(), %message_id, "confirmation email sent");
        Ok(())
    }
}
