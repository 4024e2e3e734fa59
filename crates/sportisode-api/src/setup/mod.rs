//! Application setup and initialization
//!
//! All start-up wiring lives here so `main.rs` stays a few lines and tests can
//! build the same router around in-memory backends.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;
pub mod validation;

use crate::state::AppState;
use anyhow::{Context, Result};
use sportisode_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    validation::validate_config(&config).context("Configuration validation failed")?;

    let environment = if config.is_production() {
        "production"
    } else {
        "development"
    };
    sportisode_infra::init_telemetry("sportisode-api", environment)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let stores = database::setup_database(&config).await?;

    let storage = storage::setup_storage(&config).await?;

    let state = services::initialize_services(&config, stores, storage)?;

    let router = routes::setup_routes(&config, state.clone()).await?;

    Ok((state, router))
}
