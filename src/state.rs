use std::sync::Arc;
use sqlx::PgPool;
use crate::config::AppConfig;
use crate::publisher::EventPublisher;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub events: EventPublisher,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: PgPool, events: EventPublisher, config: AppConfig) -> Self {
        Self { db, events, config: Arc::new(config) }
    }
}
