pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod validation;
pub mod ws;

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use backend_core::{InferenceRequest, SpeechBackend, SynthesisParams};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use speech_core::{CatalogError, Fingerprint, ResponseCache, VoiceCatalog};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::metrics::{metrics_endpoint, ServiceMetrics};
use crate::monitor::ActivityTracker;
use crate::validation::validate_speech_request;
use crate::ws::{ws_endpoint, WsRegistry};

#[derive(Clone)]
pub struct AppState {
    pub backend: Option<Arc<dyn SpeechBackend>>,
    pub voices: Arc<VoiceCatalog>,
    pub cache: Arc<tokio::sync::Mutex<ResponseCache>>,
    pub registry: Arc<WsRegistry>,
    pub activity: Arc<ActivityTracker>,
    pub metrics: Arc<ServiceMetrics>,
    pub config: ServerConfig,
}

#[derive(Deserialize)]
pub struct SpeechRequest {
    pub model: String,
    pub input: String,
    #[serde(flatten)]
    pub params: SynthesisParams,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend_connected: bool,
    pub cache: CacheInfo,
}

#[derive(Serialize)]
pub struct CacheInfo {
    pub current_entries: usize,
    pub max_entries: usize,
}

/// Build the application router. Middleware layers are applied by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/v1/audio/speech", post(create_speech))
        .route("/health", get(health_check))
        .route("/voices", get(list_voices))
        .route("/metrics", get(metrics_endpoint))
        .route("/ws", get(ws_endpoint))
        .with_state(state)
}

pub async fn create_speech(
    State(state): State<AppState>,
    Json(req): Json<SpeechRequest>,
) -> Result<Response, ApiError> {
    state.metrics.record_request();
    let result = synthesize_speech(&state, &req).await;
    // Activity is marked regardless of outcome.
    state.activity.touch();
    result
}

async fn synthesize_speech(state: &AppState, req: &SpeechRequest) -> Result<Response, ApiError> {
    validate_speech_request(&req.model, &req.input)?;

    let Some(backend) = state.backend.as_ref() else {
        return Err(ApiError::ServiceUnavailable);
    };

    let key = Fingerprint::compute(&req.model, &req.input);
    if let Some(audio) = state.cache.lock().await.get(&key) {
        state.metrics.record_cache_hit();
        debug!("cache hit for model '{}' ({key})", req.model);
        return Ok(wav_response(audio));
    }
    state.metrics.record_cache_miss();

    let prompt_audio = state.voices.resolve(&req.model).map_err(|e| match e {
        CatalogError::UnknownModel(model) => ApiError::UnsupportedModel(model),
        missing @ CatalogError::MissingFile(_) => ApiError::Internal(missing.into()),
    })?;

    info!(
        "synthesizing {} chars for model '{}'",
        req.input.len(),
        req.model
    );
    let request = InferenceRequest {
        prompt_audio,
        text: req.input.clone(),
        params: req.params.clone(),
    };
    let outcome = backend.synthesize(&request).await;
    state.metrics.record_backend_call(outcome.is_ok());
    let audio = outcome?;

    state.cache.lock().await.put(key, audio.clone());
    Ok(wav_response(audio))
}

fn wav_response(audio: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "audio/wav")], audio).into_response()
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend_connected = state.backend.is_some();
    let cache = state.cache.lock().await;
    Json(HealthResponse {
        status: if backend_connected { "ok" } else { "degraded" },
        backend_connected,
        cache: CacheInfo {
            current_entries: cache.len(),
            max_entries: cache.capacity(),
        },
    })
}

pub async fn list_voices(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.voices.models())
}
