//! Third-party sports data
//!
//! Each integration pairs a [`ResilientClient`](sportisode_infra::ResilientClient)
//! descriptor with pure mapping functions from the provider's JSON to the typed
//! models in [`models`]. [`SportsDataService`] picks the preferred provider and
//! degrades reads to empty results when the provider is unavailable.

pub mod api_football;
pub mod models;
pub mod thesportsdb;

pub use api_football::ApiFootballClient;
pub use models::{League, LiveFixture, StandingRow, Team};
pub use thesportsdb::TheSportsDbClient;

use async_trait::async_trait;
use sportisode_core::IntegrationsConfig;
use sportisode_infra::{Fail, FailKind, IntegrationStatus};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A sports data source
#[async_trait]
pub trait SportsProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn leagues(&self) -> Result<Vec<League>, Fail>;

    /// League table; `season` defaults to the provider's current season.
    async fn standings(&self, league_id: &str, season: Option<&str>)
        -> Result<Vec<StandingRow>, Fail>;

    /// Matches in play right now. Never served from cache.
    async fn live_fixtures(&self) -> Result<Vec<LiveFixture>, Fail>;

    async fn team(&self, team_id: &str) -> Result<Option<Team>, Fail>;

    async fn status(&self) -> IntegrationStatus;

    async fn health_check(&self) -> bool;
}

pub(crate) fn decode<T>(integration: &str, mapped: Result<T, serde_json::Error>) -> Result<T, Fail> {
    mapped.map_err(|e| Fail::new(integration, FailKind::DecodeError(e.to_string())))
}

/// Facade over the configured sports providers
#[derive(Clone)]
pub struct SportsDataService {
    primary: Arc<dyn SportsProvider>,
    providers: Vec<Arc<dyn SportsProvider>>,
}

impl SportsDataService {
    /// API-Football is preferred when a key is configured; TheSportsDB (free
    /// tier) is always registered so its status is reported.
    pub fn from_config(config: &IntegrationsConfig) -> Result<Self, reqwest::Error> {
        let thesportsdb: Arc<dyn SportsProvider> = Arc::new(TheSportsDbClient::new(config)?);
        match &config.api_football_key {
            Some(key) => {
                let api_football: Arc<dyn SportsProvider> =
                    Arc::new(ApiFootballClient::new(config, key)?);
                Ok(Self::new(api_football, vec![thesportsdb]))
            }
            None => Ok(Self::new(thesportsdb, Vec::new())),
        }
    }

    pub fn new(primary: Arc<dyn SportsProvider>, secondary: Vec<Arc<dyn SportsProvider>>) -> Self {
        let mut providers = vec![primary.clone()];
        providers.extend(secondary);
        Self { primary, providers }
    }

    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }

    /// Live matches, or an empty list while the provider is unavailable.
    pub async fn live_fixtures(&self) -> Vec<LiveFixture> {
        self.primary
            .live_fixtures()
            .await
            .unwrap_or_else(|fail| self.degraded("live fixtures", fail))
    }

    /// League table, or an empty list while the provider is unavailable.
    pub async fn standings(&self, league_id: &str, season: Option<&str>) -> Vec<StandingRow> {
        self.primary
            .standings(league_id, season)
            .await
            .unwrap_or_else(|fail| self.degraded("standings", fail))
    }

    pub async fn leagues(&self) -> Vec<League> {
        self.primary
            .leagues()
            .await
            .unwrap_or_else(|fail| self.degraded("leagues", fail))
    }

    pub async fn team(&self, team_id: &str) -> Result<Option<Team>, Fail> {
        self.primary.team(team_id).await
    }

    /// Circuit and rate counters per integration name
    pub async fn statuses(&self) -> BTreeMap<String, IntegrationStatus> {
        let mut statuses = BTreeMap::new();
        for provider in &self.providers {
            statuses.insert(provider.name().to_string(), provider.status().await);
        }
        statuses
    }

    pub async fn health(&self) -> BTreeMap<String, bool> {
        let mut health = BTreeMap::new();
        for provider in &self.providers {
            health.insert(provider.name().to_string(), provider.health_check().await);
        }
        health
    }

    fn degraded<T>(&self, what: &str, fail: Fail) -> Vec<T> {
        if fail.is_transient() {
            tracing::info!(integration = %fail.integration, error = %fail.kind, "Serving empty {}", what);
        } else {
            tracing::warn!(integration = %fail.integration, error = %fail.kind, "Serving empty {}", what);
        }
        Vec::new()
    }
}
