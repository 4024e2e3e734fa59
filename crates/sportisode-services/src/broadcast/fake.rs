use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{BroadcastError, BroadcastProvider, BroadcastSession};

/// In-memory provider that hands out sequential ids
#[derive(Default)]
pub struct FakeBroadcastProvider {
    next: AtomicUsize,
    fail_create: AtomicBool,
    deleted: Mutex<Vec<String>>,
}

impl FakeBroadcastProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BroadcastProvider for FakeBroadcastProvider {
    async fn create_live_stream(&self, _title: &str) -> Result<BroadcastSession, BroadcastError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BroadcastError::Transport("connection refused".to_string()));
        }
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BroadcastSession {
            provider_id: format!("fake-ls-{}", n),
            stream_key: format!("fake-key-{}", n),
            ingest_url: "rtmp://ingest.test/app".to_string(),
            playback_url: Some(self.playback_url(&format!("fake-pb-{}", n))),
        })
    }

    async fn delete_live_stream(&self, provider_id: &str) -> Result<(), BroadcastError> {
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(provider_id.to_string());
        }
        Ok(())
    }

    fn playback_url(&self, playback_id: &str) -> String {
        format!("https://playback.test/{}.m3u8", playback_id)
    }
}
