//! Value Objects for the storefront

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whole-unit amount tagged with an ISO 4217 currency code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: i64, currency: String }

impl Money {
    pub fn new(amount: i64, currency: &str) -> Self { Self { amount, currency: currency.to_uppercase() } }
    pub fn zero(currency: &str) -> Self { Self::new(0, currency) }
    pub fn amount(&self) -> i64 { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&format_price(self.amount, &self.currency)) }
}

/// Symbol for the currencies the storefront displays natively.
pub fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "BDT" => Some("৳"),
        "NGN" => Some("₦"),
        "INR" => Some("₹"),
        _ => None,
    }
}

/// Renders a whole-unit amount for display, e.g. `format_price(1300, "USD") == "$1,300"`.
///
/// Currencies without a known symbol fall back to `"<CODE> <amount>"`.
pub fn format_price(amount: i64, currency: &str) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let digits = group_thousands(amount.unsigned_abs());
    match currency_symbol(currency) {
        Some(symbol) => format!("{sign}{symbol}{digits}"),
        None => format!("{sign}{} {digits}", currency.to_ascii_uppercase()),
    }
}

fn group_thousands(value: u64) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, ch) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 { out.push(','); }
        out.push(ch);
    }
    out
}
