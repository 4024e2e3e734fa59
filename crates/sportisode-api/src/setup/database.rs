//! Database setup and initialization

use anyhow::{Context, Result};
use sportisode_core::Config;
use sportisode_db::{
    InMemoryMediaJobStore, InMemoryStreamStore, MediaJobStore, PgMediaJobStore, PgStreamStore,
    StreamStore,
};
use std::sync::Arc;

/// Persistence handles used by the services.
#[derive(Clone)]
pub struct Stores {
    pub media: Arc<dyn MediaJobStore>,
    pub streams: Arc<dyn StreamStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            media: Arc::new(InMemoryMediaJobStore::new()),
            streams: Arc::new(InMemoryStreamStore::new()),
        }
    }
}

/// Connect to PostgreSQL and run migrations, or fall back to in-memory stores
/// when `DATABASE_URL` is not set.
pub async fn setup_database(config: &Config) -> Result<Stores> {
    let Some(database_url) = config.database_url() else {
        tracing::warn!("DATABASE_URL not set; using in-memory stores");
        return Ok(Stores::in_memory());
    };

    tracing::info!("Connecting to database...");
    let pool = sportisode_db::connect(database_url, config.db_max_connections())
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );

    sportisode_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(Stores {
        media: Arc::new(PgMediaJobStore::new(pool.clone())),
        streams: Arc::new(PgStreamStore::new(pool)),
    })
}
