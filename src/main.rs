//! Storefront - checkout and order service

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::http::{self, AppState};
use storefront::identity::{MemorySessionStore, PgSessionStore, SessionStore};
use storefront::notifications::LogMailer;
use storefront::orders::{InMemoryOrderRepository, OrderRepository, OrderService, PgOrderRepository};
use storefront::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = AppConfig::from_env()?;

    let (orders, sessions): (Arc<dyn OrderRepository>, Arc<dyn SessionStore>) = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            (Arc::new(PgOrderRepository::new(db.clone())), Arc::new(PgSessionStore::new(db)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory and lost on restart");
            (Arc::new(InMemoryOrderRepository::new()), Arc::new(MemorySessionStore::new()))
        }
    };

    let service = OrderService::new(orders, Arc::new(LogMailer::from_config(&config)));
    let app = http::router(AppState::new(service, sessions, &config.session_cookie_name));

    let address = config.bind_address();
    tracing::info!("storefront listening on {}", address);
    axum::serve(tokio::net::TcpListener::bind(&address).await?, app).await?;
    Ok(())
}
