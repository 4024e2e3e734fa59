//! Configuration validation
//!
//! Checks that only matter once the HTTP surface is up; the config crate's own
//! `validate` covers storage and media settings.

use anyhow::Result;
use sportisode_core::Config;

/// Validate critical configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    let is_production = config.is_production();

    if is_production && config.cors_origins().iter().any(|o| o == "*") {
        return Err(anyhow::anyhow!(
            "CORS configured to allow all origins (*) in production. \
            Set specific allowed origins via CORS_ORIGINS."
        ));
    }

    if is_production && config.database_url().is_none() {
        tracing::warn!("DATABASE_URL not set in production - media and streams are kept in memory only");
    }

    if config.broadcast().webhook_secret.is_none() {
        if is_production {
            tracing::error!("BROADCAST_WEBHOOK_SECRET not set - provider webhooks are accepted unsigned");
        } else {
            tracing::warn!("BROADCAST_WEBHOOK_SECRET not set - provider webhooks are accepted unsigned");
        }
    }

    Ok(())
}
