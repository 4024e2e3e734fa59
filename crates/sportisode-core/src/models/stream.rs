use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "stream_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Scheduled,
    Starting,
    Live,
    Ended,
    Cancelled,
}

impl StreamStatus {
    /// Transitions are monotonic; `ended` and `cancelled` are terminal.
    pub fn can_transition_to(self, next: StreamStatus) -> bool {
        use StreamStatus::*;
        matches!(
            (self, next),
            (Scheduled, Starting)
                | (Scheduled, Live)
                | (Starting, Live)
                | (Live, Ended)
                | (Scheduled, Cancelled)
                | (Starting, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StreamStatus::Ended | StreamStatus::Cancelled)
    }

    /// Viewers may join while the broadcast is warming up or on air.
    pub fn accepts_viewers(self) -> bool {
        matches!(self, StreamStatus::Starting | StreamStatus::Live)
    }
}

impl Display for StreamStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StreamStatus::Scheduled => write!(f, "scheduled"),
            StreamStatus::Starting => write!(f, "starting"),
            StreamStatus::Live => write!(f, "live"),
            StreamStatus::Ended => write!(f, "ended"),
            StreamStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A live broadcast hosted by one user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LiveStream {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Opaque id of the authenticated host
    pub host_id: String,
    /// Secret RTMP key; never serialized to viewers
    #[serde(skip_serializing)]
    pub stream_key: String,
    /// Provider-side id referenced by webhooks
    pub provider_stream_id: String,
    pub ingest_url: String,
    pub playback_url: Option<String>,
    pub status: StreamStatus,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub viewer_count: i32,
    pub peak_viewers: i32,
    pub is_private: bool,
    pub allowed_viewers: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LiveStream {
    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_id == user_id
    }

    /// Private streams admit only the host and allow-listed viewers.
    pub fn can_view(&self, user_id: &str) -> bool {
        !self.is_private || self.is_host(user_id) || self.allowed_viewers.iter().any(|v| v == user_id)
    }
}

/// Parameters for creating a broadcast.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewLiveStream {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub allowed_viewers: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A state change the caller forwards to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StreamTransition {
    pub stream_id: Uuid,
    pub host_id: String,
    pub from: StreamStatus,
    pub to: StreamStatus,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(is_private: bool) -> LiveStream {
        let now = Utc::now();
        LiveStream {
            id: Uuid::new_v4(),
            title: "Derby".to_string(),
            description: String::new(),
            host_id: "host".to_string(),
            stream_key: "key".to_string(),
            provider_stream_id: "prov".to_string(),
            ingest_url: "rtmp://ingest".to_string(),
            playback_url: None,
            status: StreamStatus::Scheduled,
            scheduled_start: None,
            actual_start: None,
            actual_end: None,
            viewer_count: 0,
            peak_viewers: 0,
            is_private,
            allowed_viewers: vec!["friend".to_string()],
            tags: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn transitions_are_monotonic() {
        use StreamStatus::*;
        assert!(Scheduled.can_transition_to(Live));
        assert!(Starting.can_transition_to(Live));
        assert!(Live.can_transition_to(Ended));
        assert!(!Live.can_transition_to(Cancelled));
        assert!(!Ended.can_transition_to(Live));
        assert!(!Ended.can_transition_to(Ended));
        assert!(!Cancelled.can_transition_to(Scheduled));
        assert!(!Scheduled.can_transition_to(Ended));
        assert!(Ended.is_terminal() && Cancelled.is_terminal());
    }

    #[test]
    fn private_streams_admit_host_and_allow_list() {
        let s = stream(true);
        assert!(s.can_view("host"));
        assert!(s.can_view("friend"));
        assert!(!s.can_view("stranger"));
        assert!(stream(false).can_view("stranger"));
    }

    #[test]
    fn stream_key_is_not_serialized() {
        let json = serde_json::to_value(stream(false)).unwrap();
        assert!(json.get("stream_key").is_none());
        assert_eq!(json["status"], "scheduled");
    }
}
