//! Test helpers: build AppState and router for integration tests.
//!
//! Everything runs in-process: in-memory stores, local storage in a temp
//! directory, a fake video toolkit and broadcast provider, and sports
//! providers pointed at an address nothing listens on.
//!
//! Run with `cargo test -p sportisode-api`.

#![allow(dead_code)]

use axum_test::TestServer;
use sportisode_api::constants;
use sportisode_api::setup::database::Stores;
use sportisode_api::setup::routes;
use sportisode_api::setup::services::{assemble_state, Collaborators};
use sportisode_api::state::AppState;
use sportisode_core::models::ProcessingStatus;
use sportisode_core::Config;
use sportisode_processing::testing::FakeVideoToolkit;
use sportisode_processing::JobOutcome;
use sportisode_services::{FakeBroadcastProvider, LoggingNotifier, SportsDataService};
use sportisode_storage::{LocalStorage, StorageHandle};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const FILES_BASE_URL: &str = "http://localhost:4000/files";
pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const HOST: &str = "host-1";

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Strip scheme and authority so a signed URL can be replayed on the test server.
pub fn local_path(url: &str) -> String {
    url.strip_prefix("http://localhost:4000")
        .unwrap_or(url)
        .to_string()
}

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub broadcast: Arc<FakeBroadcastProvider>,
    pub finished: mpsc::UnboundedReceiver<(Uuid, JobOutcome)>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Wait for the transcode of `asset_id` to finish and return its final status.
    pub async fn wait_for_processing(&mut self, asset_id: Uuid) -> ProcessingStatus {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.finished.recv()).await {
                Ok(Some((id, _))) if id == asset_id => break,
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => panic!("transcode of {} did not finish", asset_id),
            }
        }
        self.state
            .media
            .store
            .get_asset(asset_id)
            .await
            .expect("store lookup")
            .expect("asset exists")
            .processing_status
    }
}

pub fn test_config(storage_path: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.0.storage.local_storage_path = storage_path.display().to_string();
    config.0.storage.local_storage_base_url = FILES_BASE_URL.to_string();
    config.0.broadcast.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    config.0.integrations.thesportsdb_base_url = "http://127.0.0.1:9".to_string();
    config.0.integrations.thesportsdb_timeout_secs = 1;
    config.0.integrations.api_football_key = None;
    config
}

/// Setup test app with in-memory stores and local storage.
pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = test_config(temp_dir.path());

    let local = Arc::new(
        LocalStorage::new(
            temp_dir.path(),
            FILES_BASE_URL.to_string(),
            &config.storage().url_signing_secret,
        )
        .await
        .expect("Failed to create local storage"),
    );
    let storage = StorageHandle {
        storage: local.clone(),
        local: Some(local),
    };

    let broadcast = Arc::new(FakeBroadcastProvider::new());
    let sports = SportsDataService::from_config(config.integrations())
        .expect("Failed to build sports clients");
    let (tx, finished) = mpsc::unbounded_channel();

    let state = assemble_state(
        &config,
        Stores::in_memory(),
        storage,
        Collaborators {
            video_toolkit: Arc::new(FakeVideoToolkit::new(12.0, 1280, 720)),
            broadcast: broadcast.clone(),
            sports,
            notifier: Arc::new(LoggingNotifier),
            job_finished: Some(tx),
        },
    );

    let router = routes::setup_routes(&config, state.clone())
        .await
        .expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        state,
        broadcast,
        finished,
        _temp_dir: temp_dir,
    }
}
