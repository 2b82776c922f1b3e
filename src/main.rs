//! Storefront service binary

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use storefront::{config::AppConfig, publisher::EventPublisher, router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = AppConfig::from_env()?;
    let db = PgPoolOptions::new().max_connections(config.db_max_connections).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let events = EventPublisher::connect(config.nats_url.as_deref()).await;
    let port = config.port;
    let events_enabled = events.is_enabled();
    let app = router(AppState::new(db, events, config));

    tracing::info!(events_enabled, "storefront listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}
