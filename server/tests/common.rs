//! Common utilities for integration tests

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;

use backend_core::{BackendError, InferenceRequest, SpeechBackend};
use speech_core::{ResponseCache, VoiceCatalog};

use server::config::ServerConfig;
use server::metrics::ServiceMetrics;
use server::monitor::ActivityTracker;
use server::ws::WsRegistry;
use server::{app, AppState};

pub const TEST_AUDIO: &[u8] = b"RIFF-test-audio-bytes";

/// Backend stand-in that counts invocations and returns canned audio.
pub struct MockBackend {
    pub calls: AtomicU64,
    audio: Bytes,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
            audio: Bytes::from_static(TEST_AUDIO),
        })
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SpeechBackend for MockBackend {
    async fn synthesize(&self, _request: &InferenceRequest) -> Result<Bytes, BackendError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.audio.clone())
    }
}

/// Reference clip shared by every test; the catalog checks file existence.
fn test_reference_clip() -> PathBuf {
    static CLIP: OnceLock<PathBuf> = OnceLock::new();
    CLIP.get_or_init(|| {
        let path = std::env::temp_dir().join(format!(
            "speech_relay_test_reference_{}.wav",
            std::process::id()
        ));
        std::fs::write(&path, b"RIFF").unwrap();
        path
    })
    .clone()
}

fn test_catalog() -> VoiceCatalog {
    let mut map = HashMap::new();
    map.insert("voiceA".to_string(), test_reference_clip());
    map.insert("voiceB".to_string(), test_reference_clip());
    // No default clip: unknown models must be rejected.
    VoiceCatalog::new(map, None)
}

fn test_state(backend: Option<Arc<dyn SpeechBackend>>) -> AppState {
    let config = ServerConfig::default();
    AppState {
        backend,
        voices: Arc::new(test_catalog()),
        cache: Arc::new(tokio::sync::Mutex::new(ResponseCache::new(
            config.max_cache_entries,
        ))),
        registry: Arc::new(WsRegistry::new()),
        activity: Arc::new(ActivityTracker::new()),
        metrics: Arc::new(ServiceMetrics::new()),
        config,
    }
}

/// Create a test app instance
pub fn create_test_app(backend: Option<Arc<MockBackend>>) -> Router {
    app(test_state(backend.map(|b| b as Arc<dyn SpeechBackend>)))
}
