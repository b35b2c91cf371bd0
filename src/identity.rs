//! Resolves who placed a request: bearer token first, then the session cookie,
//! otherwise a guest.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use mockall::automock;
use sqlx::postgres::PgPool;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session lookup failed")]
    Sql(#[from] sqlx::Error),
}

#[automock]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// User owning a non-browser API token, if the token is known and unexpired.
    async fn user_for_bearer(&self, token: &str) -> Result<Option<Uuid>, SessionError>;

    /// User owning a browser session cookie, if the session is known and unexpired.
    async fn user_for_cookie(&self, session_token: &str) -> Result<Option<Uuid>, SessionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Bearer(Uuid),
    Cookie(Uuid),
    Guest,
}

impl Identity {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Bearer(id) | Self::Cookie(id) => Some(*id),
            Self::Guest => None,
        }
    }
}

/// Credentials carried by a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub bearer: Option<String>,
    pub session_cookie: Option<String>,
}

impl Credentials {
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Self {
        Self { bearer: bearer_token(headers), session_cookie: cookie_value(headers, cookie_name) }
    }
}

/// Checks the bearer token, then the cookie. A token that does not resolve
/// falls through to the cookie rather than failing the request.
pub async fn resolve(store: &dyn SessionStore, credentials: &Credentials) -> Result<Identity, SessionError> {
    if let Some(token) = credentials.bearer.as_deref() {
        match store.user_for_bearer(token).await? {
            Some(user) => return Ok(Identity::Bearer(user)),
            None => debug!("bearer token did not resolve, trying session cookie"),
        }
    }
    if let Some(session) = credentials.session_cookie.as_deref() {
        if let Some(user) = store.user_for_cookie(session).await? {
            return Ok(Identity::Cookie(user));
        }
    }
    Ok(Identity::Guest)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get_all(header::COOKIE).iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.trim_matches('"').to_string())
}

const USER_FOR_BEARER_SQL: &str = "SELECT user_id FROM api_tokens WHERE token = $1 AND (expires_at IS NULL OR expires_at > NOW())";
const USER_FOR_COOKIE_SQL: &str = "SELECT user_id FROM sessions WHERE session_token = $1 AND expires > NOW()";

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn user_for_bearer(&self, token: &str) -> Result<Option<Uuid>, SessionError> {
        let row: Option<(Uuid,)> = sqlx::query_as(USER_FOR_BEARER_SQL).bind(token).fetch_optional(&self.pool).await?;
        Ok(row.map(|(id,)| id))
    }

    async fn user_for_cookie(&self, session_token: &str) -> Result<Option<Uuid>, SessionError> {
        let row: Option<(Uuid,)> = sqlx::query_as(USER_FOR_COOKIE_SQL).bind(session_token).fetch_optional(&self.pool).await?;
        Ok(row.map(|(id,)| id))
    }
}

/// Fixed token tables, for running without a database.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    bearer: HashMap<String, Uuid>,
    cookies: HashMap<String, Uuid>,
}

impl MemorySessionStore {
    pub fn new() -> Self { Self::default() }
    pub fn with_bearer(mut self, token: impl Into<String>, user: Uuid) -> Self { self.bearer.insert(token.into(), user); self }
    pub fn with_cookie(mut self, session: impl Into<String>, user: Uuid) -> Self { self.cookies.insert(session.into(), user); self }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn user_for_bearer(&self, token: &str) -> Result<Option<Uuid>, SessionError> { Ok(self.bearer.get(token).copied()) }
    async fn user_for_cookie(&self, session_token: &str) -> Result<Option<Uuid>, SessionError> { Ok(self.cookies.get(session_token).copied()) }
}
