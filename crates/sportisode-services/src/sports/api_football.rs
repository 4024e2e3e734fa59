//! API-Football (RapidAPI) integration

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::Value;
use sportisode_core::IntegrationsConfig;
use sportisode_infra::{
    DataClass, Fail, IntegrationDescriptor, IntegrationRequest, IntegrationState,
    IntegrationStatus, ResilientClient,
};
use std::sync::Arc;
use std::time::Duration;

use super::models::{lenient_id, lenient_int, League, LiveFixture, StandingRow, Team};
use super::{decode, SportsProvider};

pub const API_FOOTBALL: &str = "api_football";

const FIXTURES_TTL: Duration = Duration::from_secs(300);
const STANDINGS_TTL: Duration = Duration::from_secs(1800);
const REFERENCE_TTL: Duration = Duration::from_secs(3600);
const LEAGUES_TTL: Duration = Duration::from_secs(86400);
const LIVE_TTL: Duration = Duration::from_secs(60);

/// Descriptor for API-Football. `api_key` is sent as a RapidAPI header.
pub fn descriptor(config: &IntegrationsConfig, api_key: &str) -> IntegrationDescriptor {
    IntegrationDescriptor::new(API_FOOTBALL, config.api_football_base_url.clone())
        .with_header("X-RapidAPI-Key", api_key)
        .with_header("X-RapidAPI-Host", config.api_football_host.clone())
        .with_timeout(Duration::from_secs(config.api_football_timeout_secs))
        .with_limits(config.burst_limit, config.api_football_hourly_limit)
        .with_default_ttl(FIXTURES_TTL)
        .with_ttl(DataClass::Fixtures, FIXTURES_TTL)
        .with_ttl(DataClass::Events, FIXTURES_TTL)
        .with_ttl(DataClass::Standings, STANDINGS_TTL)
        .with_ttl(DataClass::Teams, REFERENCE_TTL)
        .with_ttl(DataClass::Players, REFERENCE_TTL)
        .with_ttl(DataClass::Leagues, LEAGUES_TTL)
        .with_ttl(DataClass::Live, LIVE_TTL)
        .with_health_probe("timezone", std::iter::empty::<(String, String)>())
}

/// API-Football seasons are named by their starting year.
pub fn current_season() -> String {
    Utc::now().year().to_string()
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "Vec::new")]
    response: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawLeagueEntry {
    league: RawLeague,
    country: Option<RawCountry>,
}

#[derive(Debug, Deserialize)]
struct RawLeague {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    name: Option<String>,
    logo: Option<String>,
    #[serde(default)]
    standings: Vec<Vec<RawStanding>>,
}

#[derive(Debug, Deserialize)]
struct RawCountry {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStandingEntry {
    league: RawLeague,
}

#[derive(Debug, Deserialize)]
struct RawStanding {
    #[serde(default, deserialize_with = "lenient_int")]
    rank: Option<i32>,
    team: RawTeamRef,
    #[serde(default, deserialize_with = "lenient_int")]
    points: Option<i32>,
    all: Option<RawRecord>,
}

#[derive(Debug, Deserialize)]
struct RawTeamRef {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default, deserialize_with = "lenient_int")]
    played: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    win: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    draw: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    lose: Option<i32>,
    goals: Option<RawGoalsFor>,
}

#[derive(Debug, Deserialize)]
struct RawGoalsFor {
    #[serde(rename = "for", default, deserialize_with = "lenient_int")]
    scored: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    against: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct RawFixtureEntry {
    fixture: RawFixture,
    league: Option<RawLeague>,
    teams: RawFixtureTeams,
    goals: Option<RawScore>,
}

#[derive(Debug, Deserialize)]
struct RawFixture {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    status: Option<RawFixtureStatus>,
}

#[derive(Debug, Deserialize)]
struct RawFixtureStatus {
    short: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    elapsed: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct RawFixtureTeams {
    home: RawTeamRef,
    away: RawTeamRef,
}

#[derive(Debug, Deserialize)]
struct RawScore {
    #[serde(default, deserialize_with = "lenient_int")]
    home: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    away: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct RawTeamEntry {
    team: RawTeam,
    venue: Option<RawVenue>,
}

#[derive(Debug, Deserialize)]
struct RawTeam {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    name: Option<String>,
    country: Option<String>,
    logo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVenue {
    name: Option<String>,
}

pub fn map_leagues(body: Value) -> Result<Vec<League>, serde_json::Error> {
    let envelope: Envelope<RawLeagueEntry> = serde_json::from_value(body)?;
    Ok(envelope
        .response
        .into_iter()
        .filter_map(|entry| {
            Some(League {
                id: entry.league.id?,
                name: entry.league.name?,
                sport: Some("Soccer".to_string()),
                country: entry.country.and_then(|c| c.name),
                badge_url: entry.league.logo,
            })
        })
        .collect())
}

/// Standings live at `response[0].league.standings[0]`; further groups
/// (cup group stages) are appended in order.
pub fn map_standings(body: Value) -> Result<Vec<StandingRow>, serde_json::Error> {
    let envelope: Envelope<RawStandingEntry> = serde_json::from_value(body)?;
    let Some(entry) = envelope.response.into_iter().next() else {
        return Ok(Vec::new());
    };
    Ok(entry
        .league
        .standings
        .into_iter()
        .flatten()
        .filter_map(|s| {
            let record = s.all;
            let goals = record.as_ref().and_then(|r| r.goals.as_ref());
            Some(StandingRow {
                rank: s.rank?,
                team_id: s.team.id?,
                team_name: s.team.name?,
                played: record.as_ref().and_then(|r| r.played).unwrap_or(0),
                won: record.as_ref().and_then(|r| r.win).unwrap_or(0),
                drawn: record.as_ref().and_then(|r| r.draw).unwrap_or(0),
                lost: record.as_ref().and_then(|r| r.lose).unwrap_or(0),
                goals_for: goals.and_then(|g| g.scored).unwrap_or(0),
                goals_against: goals.and_then(|g| g.against).unwrap_or(0),
                points: s.points.unwrap_or(0),
            })
        })
        .collect())
}

pub fn map_live_fixtures(body: Value) -> Result<Vec<LiveFixture>, serde_json::Error> {
    let envelope: Envelope<RawFixtureEntry> = serde_json::from_value(body)?;
    Ok(envelope
        .response
        .into_iter()
        .filter_map(|entry| {
            let status = entry.fixture.status;
            Some(LiveFixture {
                id: entry.fixture.id?,
                league: entry.league.and_then(|l| l.name),
                home_team: entry.teams.home.name?,
                away_team: entry.teams.away.name?,
                home_score: entry.goals.as_ref().and_then(|g| g.home),
                away_score: entry.goals.as_ref().and_then(|g| g.away),
                status: status.as_ref().and_then(|s| s.short.clone()),
                elapsed: status.as_ref().and_then(|s| s.elapsed),
            })
        })
        .collect())
}

pub fn map_team(body: Value) -> Result<Option<Team>, serde_json::Error> {
    let envelope: Envelope<RawTeamEntry> = serde_json::from_value(body)?;
    Ok(envelope.response.into_iter().find_map(|entry| {
        Some(Team {
            id: entry.team.id?,
            name: entry.team.name?,
            country: entry.team.country,
            badge_url: entry.team.logo,
            stadium: entry.venue.and_then(|v| v.name),
        })
    }))
}

#[derive(Clone)]
pub struct ApiFootballClient {
    client: ResilientClient,
}

impl ApiFootballClient {
    pub fn new(config: &IntegrationsConfig, api_key: &str) -> Result<Self, reqwest::Error> {
        let descriptor = descriptor(config, api_key);
        let state = Arc::new(IntegrationState::new(&descriptor));
        Self::with_state(descriptor, state)
    }

    pub fn with_state(
        descriptor: IntegrationDescriptor,
        state: Arc<IntegrationState>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: ResilientClient::new(descriptor, state)?,
        })
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    pub async fn team_statistics(
        &self,
        team_id: &str,
        league_id: &str,
        season: Option<&str>,
    ) -> Result<Value, Fail> {
        let season = season.map(str::to_string).unwrap_or_else(current_season);
        let request = IntegrationRequest::new("teams/statistics", DataClass::Teams)
            .param("team", team_id)
            .param("league", league_id)
            .param("season", season.as_str())
            .cache_key(format!("team_stats_{}_{}_{}", team_id, league_id, season));
        self.client.call(&request).await
    }

    pub async fn player(&self, player_id: &str, season: Option<&str>) -> Result<Value, Fail> {
        let season = season.map(str::to_string).unwrap_or_else(current_season);
        let request = IntegrationRequest::new("players", DataClass::Players)
            .param("id", player_id)
            .param("season", season.as_str())
            .cache_key(format!("player_{}_{}", player_id, season));
        self.client.call(&request).await
    }

    pub async fn top_scorers(&self, league_id: &str, season: Option<&str>) -> Result<Value, Fail> {
        self.league_players("players/topscorers", "topscorers", league_id, season)
            .await
    }

    pub async fn top_assists(&self, league_id: &str, season: Option<&str>) -> Result<Value, Fail> {
        self.league_players("players/topassists", "topassists", league_id, season)
            .await
    }

    async fn league_players(
        &self,
        endpoint: &str,
        prefix: &str,
        league_id: &str,
        season: Option<&str>,
    ) -> Result<Value, Fail> {
        let season = season.map(str::to_string).unwrap_or_else(current_season);
        let request = IntegrationRequest::new(endpoint, DataClass::Players)
            .param("league", league_id)
            .param("season", season.as_str())
            .cache_key(format!("{}_{}_{}", prefix, league_id, season));
        self.client.call(&request).await
    }

    pub async fn predictions(&self, fixture_id: &str) -> Result<Value, Fail> {
        let request = IntegrationRequest::new("predictions", DataClass::Fixtures)
            .param("fixture", fixture_id)
            .cache_key(format!("predictions_{}", fixture_id));
        self.client.call(&request).await
    }

    pub async fn odds(&self, fixture_id: &str) -> Result<Value, Fail> {
        let request = IntegrationRequest::new("odds", DataClass::Fixtures)
            .param("fixture", fixture_id)
            .cache_key(format!("odds_{}", fixture_id));
        self.client.call(&request).await
    }
}

#[async_trait]
impl SportsProvider for ApiFootballClient {
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn leagues(&self) -> Result<Vec<League>, Fail> {
        let request = IntegrationRequest::new("leagues", DataClass::Leagues)
            .param("current", "true")
            .cache_key("leagues_current");
        let body = self.client.call_with_fallback(&request).await?;
        decode(self.client.name(), map_leagues(body))
    }

    async fn standings(
        &self,
        league_id: &str,
        season: Option<&str>,
    ) -> Result<Vec<StandingRow>, Fail> {
        let season = season.map(str::to_string).unwrap_or_else(current_season);
        let request = IntegrationRequest::new("standings", DataClass::Standings)
            .param("league", league_id)
            .param("season", season.as_str())
            .cache_key(format!("standings_{}_{}", league_id, season));
        let body = self.client.call_with_fallback(&request).await?;
        decode(self.client.name(), map_standings(body))
    }

    async fn live_fixtures(&self) -> Result<Vec<LiveFixture>, Fail> {
        let request = IntegrationRequest::new("fixtures", DataClass::Live)
            .param("live", "all")
            .uncached();
        let body = self.client.call(&request).await?;
        decode(self.client.name(), map_live_fixtures(body))
    }

    async fn team(&self, team_id: &str) -> Result<Option<Team>, Fail> {
        let request = IntegrationRequest::new("teams", DataClass::Teams)
            .param("id", team_id)
            .cache_key(format!("team_{}", team_id));
        let body = self.client.call(&request).await?;
        decode(self.client.name(), map_team(body))
    }

    async fn status(&self) -> IntegrationStatus {
        self.client.status().await
    }

    async fn health_check(&self) -> bool {
        self.client.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sportisode_core::Config;

    #[test]
    fn descriptor_sends_rapidapi_headers() {
        let config = Config::default();
        let d = descriptor(config.integrations(), "secret-key");
        assert!(d
            .headers
            .contains(&("X-RapidAPI-Key".to_string(), "secret-key".to_string())));
        assert!(d.headers.contains(&(
            "X-RapidAPI-Host".to_string(),
            "api-football-v1.p.rapidapi.com".to_string()
        )));
        assert_eq!(d.hourly_limit, 300);
        assert_eq!(d.timeout, Duration::from_secs(15));
        assert_eq!(d.ttl_for(DataClass::Live), Duration::from_secs(60));
        assert_eq!(d.ttl_for(DataClass::Leagues), Duration::from_secs(86400));
        assert_eq!(
            d.health_probe.as_ref().map(|p| p.endpoint.as_str()),
            Some("timezone")
        );
    }

    #[test]
    fn maps_nested_standings() {
        let body = json!({
            "response": [{
                "league": {
                    "id": 39,
                    "name": "Premier League",
                    "standings": [[
                        {
                            "rank": 1,
                            "team": { "id": 42, "name": "Arsenal" },
                            "points": 89,
                            "all": {
                                "played": 38, "win": 28, "draw": 5, "lose": 5,
                                "goals": { "for": 91, "against": 29 }
                            }
                        },
                        {
                            "rank": 2,
                            "team": { "id": 50, "name": "Manchester City" },
                            "points": 88
                        }
                    ]]
                }
            }]
        });

        let rows = map_standings(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].team_id, "42");
        assert_eq!(rows[0].goals_for, 91);
        assert_eq!(rows[0].lost, 5);
        assert_eq!(rows[1].played, 0);
    }

    #[test]
    fn empty_response_maps_to_empty_table() {
        assert!(map_standings(json!({ "response": [] })).unwrap().is_empty());
        assert!(map_standings(json!({})).unwrap().is_empty());
    }

    #[test]
    fn maps_live_fixtures() {
        let body = json!({
            "response": [{
                "fixture": { "id": 1035037, "status": { "short": "2H", "elapsed": 67 } },
                "league": { "id": 39, "name": "Premier League" },
                "teams": {
                    "home": { "id": 33, "name": "Manchester United" },
                    "away": { "id": 47, "name": "Tottenham" }
                },
                "goals": { "home": 2, "away": null }
            }]
        });
        let fixtures = map_live_fixtures(body).unwrap();
        assert_eq!(fixtures[0].id, "1035037");
        assert_eq!(fixtures[0].elapsed, Some(67));
        assert_eq!(fixtures[0].home_score, Some(2));
        assert_eq!(fixtures[0].away_score, None);
        assert_eq!(fixtures[0].league.as_deref(), Some("Premier League"));
    }

    #[test]
    fn maps_leagues_and_teams() {
        let leagues = map_leagues(json!({
            "response": [{
                "league": { "id": 140, "name": "La Liga", "logo": "https://x/140.png" },
                "country": { "name": "Spain" }
            }]
        }))
        .unwrap();
        assert_eq!(leagues[0].country.as_deref(), Some("Spain"));

        let team = map_team(json!({
            "response": [{
                "team": { "id": 541, "name": "Real Madrid", "country": "Spain" },
                "venue": { "name": "Estadio Santiago Bernabéu" }
            }]
        }))
        .unwrap()
        .unwrap();
        assert_eq!(team.id, "541");
        assert_eq!(team.stadium.as_deref(), Some("Estadio Santiago Bernabéu"));
    }
}
