use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct League {
    pub id: String,
    pub name: String,
    pub sport: Option<String>,
    pub country: Option<String>,
    pub badge_url: Option<String>,
}

/// One row of a league table
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StandingRow {
    pub rank: i32,
    pub team_id: String,
    pub team_name: String,
    pub played: i32,
    pub won: i32,
    pub drawn: i32,
    pub lost: i32,
    pub goals_for: i32,
    pub goals_against: i32,
    pub points: i32,
}

impl StandingRow {
    pub fn goal_difference(&self) -> i32 {
        self.goals_for - self.goals_against
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LiveFixture {
    pub id: String,
    pub league: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    /// Provider status such as `1H`, `HT` or `FT`
    pub status: Option<String>,
    /// Minutes played, when the provider reports it
    pub elapsed: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub country: Option<String>,
    pub badge_url: Option<String>,
    pub stadium: Option<String>,
}

/// Integers arrive as JSON numbers from one provider and as strings from the other.
pub(crate) fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Ids are strings on one provider and numbers on the other.
pub(crate) fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "lenient_int")]
        n: Option<i32>,
        #[serde(default, deserialize_with = "lenient_id")]
        id: Option<String>,
    }

    #[test]
    fn lenient_fields_accept_strings_and_numbers() {
        let a: Probe = serde_json::from_str(r#"{"n":"7","id":133604}"#).unwrap();
        assert_eq!(a.n, Some(7));
        assert_eq!(a.id.as_deref(), Some("133604"));

        let b: Probe = serde_json::from_str(r#"{"n":null,"id":""}"#).unwrap();
        assert_eq!(b.n, None);
        assert_eq!(b.id, None);

        let c: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(c.n, None);
    }
}
