//! Environment-driven configuration.

use dotenvy::dotenv;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub server_host: String,
    pub port: u16,
    /// `None` runs the server against in-memory storage.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub session_cookie_name: String,
    pub store_name: String,
    pub store_currency: String,
    pub email_sender: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str, default: &str| lookup(name).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string());

        let port = get("PORT", "8083").parse::<u16>()
            .map_err(|e| ConfigError::Invalid { name: "PORT", reason: e.to_string() })?;
        let database_max_connections = get("DATABASE_MAX_CONNECTIONS", "10").parse::<u32>()
            .map_err(|e| ConfigError::Invalid { name: "DATABASE_MAX_CONNECTIONS", reason: e.to_string() })?;
        let store_currency = get("STORE_CURRENCY", "BDT").to_ascii_uppercase();
        if store_currency.len() != 3 || !store_currency.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ConfigError::Invalid { name: "STORE_CURRENCY", reason: format!("'{store_currency}' is not an ISO 4217 code") });
        }

        let config = Self {
            server_host: get("SERVER_HOST", "0.0.0.0"),
            port,
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            database_max_connections,
            session_cookie_name: get("SESSION_COOKIE_NAME", "session_token"),
            store_name: get("STORE_NAME", "Storefront"),
            store_currency,
            email_sender: get("EMAIL_SENDER", "orders@storefront.local"),
        };
        tracing::info!(port = config.port, database = config.database_url.is_some(), "configuration loaded");
        Ok(config)
    }

    pub fn bind_address(&self) -> String { format!("{}:{}", self.server_host, self.port) }
}
