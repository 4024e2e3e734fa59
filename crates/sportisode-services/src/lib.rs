//! Sportisode Services Layer
//!
//! Business services that sit between the API and the infrastructure crates:
//! third-party sports data read through the resilient client, the broadcast
//! provider client, the live stream state machine and the inbound webhook
//! gateway that drives it. HTTP handling stays in `sportisode-api`.

pub mod broadcast;
pub mod lifecycle;
pub mod sports;
pub mod webhook_gateway;

pub use broadcast::{BroadcastError, BroadcastProvider, BroadcastSession, MuxBroadcastClient};
pub use lifecycle::{LifecycleError, LoggingNotifier, StreamLifecycle, StreamNotifier};
pub use sports::{
    ApiFootballClient, League, LiveFixture, SportsDataService, SportsProvider, StandingRow, Team,
    TheSportsDbClient,
};
pub use webhook_gateway::{WebhookError, WebhookGateway, WebhookOutcome};

#[cfg(any(test, feature = "test-helpers"))]
pub use broadcast::FakeBroadcastProvider;
