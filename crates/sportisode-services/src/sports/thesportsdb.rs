//! TheSportsDB (free tier) integration

use async_trait::async_trait;
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

pub const THESPORTSDB: &str = "thesportsdb";

/// Season used when the caller does not name one
pub const DEFAULT_SEASON: &str = "2024-2025";

const LEAGUE_TTL: Duration = Duration::from_secs(900);
const PLAYER_TTL: Duration = Duration::from_secs(1800);
const EVENT_TTL: Duration = Duration::from_secs(3600);
const LIVE_TTL: Duration = Duration::from_secs(30);

/// Descriptor for TheSportsDB. The API key is part of the path.
pub fn descriptor(config: &IntegrationsConfig) -> IntegrationDescriptor {
    let base_url = format!(
        "{}/{}",
        config.thesportsdb_base_url.trim_end_matches('/'),
        config.thesportsdb_api_key
    );
    IntegrationDescriptor::new(THESPORTSDB, base_url)
        .with_timeout(Duration::from_secs(config.thesportsdb_timeout_secs))
        .with_limits(config.burst_limit, config.thesportsdb_hourly_limit)
        .with_default_ttl(LEAGUE_TTL)
        .with_ttl(DataClass::Leagues, LEAGUE_TTL)
        .with_ttl(DataClass::Standings, LEAGUE_TTL)
        .with_ttl(DataClass::Teams, LEAGUE_TTL)
        .with_ttl(DataClass::Players, PLAYER_TTL)
        .with_ttl(DataClass::Events, EVENT_TTL)
        .with_ttl(DataClass::Fixtures, EVENT_TTL)
        .with_ttl(DataClass::Live, LIVE_TTL)
        .with_health_probe("search_all_leagues.php", [("s", "Soccer")])
}

#[derive(Debug, Deserialize)]
struct LeaguesEnvelope {
    // search_all_leagues answers under "countries", lookupleague under "leagues"
    countries: Option<Vec<RawLeague>>,
    leagues: Option<Vec<RawLeague>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLeague {
    #[serde(default, deserialize_with = "lenient_id")]
    id_league: Option<String>,
    str_league: Option<String>,
    str_sport: Option<String>,
    str_country: Option<String>,
    str_badge: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableEnvelope {
    table: Option<Vec<RawTableRow>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTableRow {
    #[serde(default, deserialize_with = "lenient_id")]
    id_team: Option<String>,
    str_team: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    int_rank: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    int_played: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    int_win: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    int_draw: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    int_loss: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    int_goals_for: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    int_goals_against: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    int_points: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct EventsEnvelope {
    events: Option<Vec<RawEvent>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default, deserialize_with = "lenient_id")]
    id_event: Option<String>,
    str_league: Option<String>,
    str_home_team: Option<String>,
    str_away_team: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    int_home_score: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    int_away_score: Option<i32>,
    str_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    str_progress: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct TeamsEnvelope {
    teams: Option<Vec<RawTeam>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTeam {
    #[serde(default, deserialize_with = "lenient_id")]
    id_team: Option<String>,
    str_team: Option<String>,
    str_country: Option<String>,
    str_badge: Option<String>,
    str_stadium: Option<String>,
}

/// Map `search_all_leagues.php` / `lookupleague.php` bodies.
pub fn map_leagues(body: Value) -> Result<Vec<League>, serde_json::Error> {
    let envelope: LeaguesEnvelope = serde_json::from_value(body)?;
    let raw = envelope
        .countries
        .or(envelope.leagues)
        .unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|l| {
            Some(League {
                id: l.id_league?,
                name: l.str_league?,
                sport: l.str_sport,
                country: l.str_country,
                badge_url: l.str_badge,
            })
        })
        .collect())
}

/// Map a `lookuptable.php` body. A `null` table maps to an empty list.
pub fn map_standings(body: Value) -> Result<Vec<StandingRow>, serde_json::Error> {
    let envelope: TableEnvelope = serde_json::from_value(body)?;
    let mut rows: Vec<StandingRow> = envelope
        .table
        .unwrap_or_default()
        .into_iter()
        .filter_map(|r| {
            Some(StandingRow {
                rank: r.int_rank?,
                team_id: r.id_team?,
                team_name: r.str_team?,
                played: r.int_played.unwrap_or(0),
                won: r.int_win.unwrap_or(0),
                drawn: r.int_draw.unwrap_or(0),
                lost: r.int_loss.unwrap_or(0),
                goals_for: r.int_goals_for.unwrap_or(0),
                goals_against: r.int_goals_against.unwrap_or(0),
                points: r.int_points.unwrap_or(0),
            })
        })
        .collect();
    rows.sort_by_key(|r| r.rank);
    Ok(rows)
}

/// Map a `latestsoccer.php` or events body.
pub fn map_live_fixtures(body: Value) -> Result<Vec<LiveFixture>, serde_json::Error> {
    let envelope: EventsEnvelope = serde_json::from_value(body)?;
    Ok(envelope
        .events
        .unwrap_or_default()
        .into_iter()
        .filter_map(|e| {
            Some(LiveFixture {
                id: e.id_event?,
                league: e.str_league,
                home_team: e.str_home_team?,
                away_team: e.str_away_team?,
                home_score: e.int_home_score,
                away_score: e.int_away_score,
                status: e.str_status,
                elapsed: e.str_progress,
            })
        })
        .collect())
}

/// Map a `lookupteam.php` body to its single team.
pub fn map_team(body: Value) -> Result<Option<Team>, serde_json::Error> {
    let envelope: TeamsEnvelope = serde_json::from_value(body)?;
    Ok(envelope
        .teams
        .unwrap_or_default()
        .into_iter()
        .find_map(|t| {
            Some(Team {
                id: t.id_team?,
                name: t.str_team?,
                country: t.str_country,
                badge_url: t.str_badge,
                stadium: t.str_stadium,
            })
        }))
}

/// TheSportsDB client. Cheap to clone.
#[derive(Clone)]
pub struct TheSportsDbClient {
    client: ResilientClient,
}

impl TheSportsDbClient {
    pub fn new(config: &IntegrationsConfig) -> Result<Self, reqwest::Error> {
        let descriptor = descriptor(config);
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

    pub async fn league_teams(&self, league_name: &str) -> Result<Value, Fail> {
        let request = IntegrationRequest::new("search_all_teams.php", DataClass::Teams)
            .param("l", league_name)
            .cache_key(format!("league_teams_{}", league_name));
        self.client.call(&request).await
    }

    pub async fn player(&self, player_id: &str) -> Result<Value, Fail> {
        let request = IntegrationRequest::new("lookupplayer.php", DataClass::Players)
            .param("id", player_id)
            .cache_key(format!("player_{}", player_id));
        self.client.call(&request).await
    }

    pub async fn team_players(&self, team_name: &str) -> Result<Value, Fail> {
        let request = IntegrationRequest::new("searchplayers.php", DataClass::Players)
            .param("t", team_name)
            .cache_key(format!("team_players_{}", team_name));
        self.client.call(&request).await
    }

    pub async fn next_events(&self, league_id: &str) -> Result<Vec<LiveFixture>, Fail> {
        let request = IntegrationRequest::new("eventsnextleague.php", DataClass::Events)
            .param("id", league_id)
            .cache_key(format!("next_events_{}", league_id));
        let body = self.client.call(&request).await?;
        decode(self.client.name(), map_live_fixtures(body))
    }

    pub async fn last_events(&self, team_id: &str) -> Result<Vec<LiveFixture>, Fail> {
        let request = IntegrationRequest::new("eventslast.php", DataClass::Events)
            .param("id", team_id)
            .cache_key(format!("last_events_{}", team_id));
        let body = self.client.call(&request).await?;
        // eventslast answers under "results"
        let body = match body {
            Value::Object(mut map) => {
                let results = map.remove("results").unwrap_or(Value::Null);
                serde_json::json!({ "events": results })
            }
            other => other,
        };
        decode(self.client.name(), map_live_fixtures(body))
    }

    pub async fn event(&self, event_id: &str) -> Result<Option<LiveFixture>, Fail> {
        let request = IntegrationRequest::new("lookupevent.php", DataClass::Events)
            .param("id", event_id)
            .cache_key(format!("event_{}", event_id));
        let body = self.client.call(&request).await?;
        decode(self.client.name(), map_live_fixtures(body)).map(|events| events.into_iter().next())
    }

    pub async fn league(&self, league_id: &str) -> Result<Option<League>, Fail> {
        let request = IntegrationRequest::new("lookupleague.php", DataClass::Leagues)
            .param("id", league_id)
            .cache_key(format!("league_{}", league_id));
        let body = self.client.call(&request).await?;
        decode(self.client.name(), map_leagues(body)).map(|leagues| leagues.into_iter().next())
    }
}

#[async_trait]
impl SportsProvider for TheSportsDbClient {
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn leagues(&self) -> Result<Vec<League>, Fail> {
        let request = IntegrationRequest::new("search_all_leagues.php", DataClass::Leagues)
            .param("s", "Soccer")
            .cache_key("leagues_Soccer");
        let body = self.client.call_with_fallback(&request).await?;
        decode(self.client.name(), map_leagues(body))
    }

    async fn standings(
        &self,
        league_id: &str,
        season: Option<&str>,
    ) -> Result<Vec<StandingRow>, Fail> {
        let season = season.unwrap_or(DEFAULT_SEASON);
        let request = IntegrationRequest::new("lookuptable.php", DataClass::Standings)
            .param("l", league_id)
            .param("s", season)
            .cache_key(format!("standings_{}_{}", league_id, season));
        let body = self.client.call_with_fallback(&request).await?;
        decode(self.client.name(), map_standings(body))
    }

    async fn live_fixtures(&self) -> Result<Vec<LiveFixture>, Fail> {
        let request = IntegrationRequest::new("latestsoccer.php", DataClass::Live).uncached();
        let body = self.client.call(&request).await?;
        decode(self.client.name(), map_live_fixtures(body))
    }

    async fn team(&self, team_id: &str) -> Result<Option<Team>, Fail> {
        let request = IntegrationRequest::new("lookupteam.php", DataClass::Teams)
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
    fn descriptor_embeds_key_in_path() {
        let config = Config::default();
        let d = descriptor(config.integrations());
        assert_eq!(
            d.url_for("lookuptable.php"),
            "https://www.thesportsdb.com/api/v1/json/3/lookuptable.php"
        );
        assert_eq!(d.hourly_limit, 100);
        assert_eq!(d.burst_limit, 10);
        assert_eq!(d.ttl_for(DataClass::Live), Duration::from_secs(30));
        assert_eq!(d.ttl_for(DataClass::Players), Duration::from_secs(1800));
        assert_eq!(d.ttl_for(DataClass::Standings), Duration::from_secs(900));
        assert_eq!(d.timeout, Duration::from_secs(10));
    }

    #[test]
    fn maps_table_rows_sorted_by_rank() {
        let body = json!({
            "table": [
                {
                    "idTeam": "133602", "strTeam": "Liverpool", "intRank": "2",
                    "intPlayed": "38", "intWin": "25", "intDraw": "9", "intLoss": "4",
                    "intGoalsFor": "86", "intGoalsAgainst": "41", "intPoints": "84"
                },
                {
                    "idTeam": "133613", "strTeam": "Arsenal", "intRank": "1",
                    "intPlayed": "38", "intWin": "28", "intDraw": "5", "intLoss": "5",
                    "intGoalsFor": "91", "intGoalsAgainst": "29", "intPoints": "89"
                },
                { "strTeam": "No id", "intRank": "3" }
            ]
        });

        let rows = map_standings(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].team_name, "Arsenal");
        assert_eq!(rows[0].points, 89);
        assert_eq!(rows[0].goal_difference(), 62);
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn null_table_is_empty() {
        assert!(map_standings(json!({ "table": null })).unwrap().is_empty());
    }

    #[test]
    fn maps_live_events() {
        let body = json!({
            "events": [{
                "idEvent": "2052711", "strLeague": "English Premier League",
                "strHomeTeam": "Chelsea", "strAwayTeam": "Everton",
                "intHomeScore": "1", "intAwayScore": null,
                "strStatus": "1H", "strProgress": "34"
            }]
        });
        let fixtures = map_live_fixtures(body).unwrap();
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].home_score, Some(1));
        assert_eq!(fixtures[0].away_score, None);
        assert_eq!(fixtures[0].elapsed, Some(34));
        assert_eq!(fixtures[0].status.as_deref(), Some("1H"));
    }

    #[test]
    fn maps_leagues_from_either_envelope() {
        let search = json!({ "countries": [
            { "idLeague": "4328", "strLeague": "English Premier League", "strSport": "Soccer" }
        ]});
        let lookup = json!({ "leagues": [
            { "idLeague": "4335", "strLeague": "Spanish La Liga", "strCountry": "Spain" }
        ]});
        assert_eq!(map_leagues(search).unwrap()[0].id, "4328");
        assert_eq!(
            map_leagues(lookup).unwrap()[0].country.as_deref(),
            Some("Spain")
        );
    }

    #[test]
    fn maps_single_team() {
        let body = json!({ "teams": [
            { "idTeam": "133604", "strTeam": "Arsenal", "strStadium": "Emirates Stadium" }
        ]});
        let team = map_team(body).unwrap().unwrap();
        assert_eq!(team.stadium.as_deref(), Some("Emirates Stadium"));
        assert!(map_team(json!({ "teams": null })).unwrap().is_none());
    }

    #[tokio::test]
    async fn standings_read_through_cache_with_key_in_path() {
        use axum::routing::get;
        use axum::{Json, Router};
        use std::sync::atomic::{AtomicUsize, Ordering};

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/test-key/lookuptable.php",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "table": [
                        { "idTeam": "1", "strTeam": "Leaders", "intRank": "1", "intPoints": "3" }
                    ]}))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut config = Config::default().integrations().clone();
        config.thesportsdb_base_url = format!("http://{}", addr);
        config.thesportsdb_api_key = "test-key".to_string();
        let client = TheSportsDbClient::new(&config).unwrap();

        let first = client.standings("4328", None).await.unwrap();
        let second = client.standings("4328", None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].points, 3);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let status = client.status().await;
        assert_eq!(status.requests_this_hour, 1);
        assert!(!status.open);
    }

    #[test]
    fn rejects_non_object_bodies() {
        assert!(map_standings(json!("rate limited")).is_err());
    }
}
