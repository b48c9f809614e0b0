use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::retry::retry_fixed;

/// Total attempts per inference call.
pub const CALL_ATTEMPTS: usize = 3;
/// Fixed delay between inference attempts.
pub const CALL_RETRY_DELAY: Duration = Duration::from_secs(2);

const CONNECT_ATTEMPTS: usize = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Errors surfaced by the inference backend wrapper.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("inference backend unavailable: {0}")]
    Unavailable(String),

    #[error("inference backend returned an unusable result: {0}")]
    InvalidResult(String),
}

/// Style and decoding knobs forwarded opaquely to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisParams {
    #[serde(default = "default_infer_mode")]
    pub infer_mode: String,
    #[serde(default = "default_max_text_tokens")]
    pub max_text_tokens_per_sentence: u32,
    #[serde(default = "default_bucket_size")]
    pub sentences_bucket_max_size: u32,
}

fn default_infer_mode() -> String {
    "standard".to_string()
}

fn default_max_text_tokens() -> u32 {
    80
}

fn default_bucket_size() -> u32 {
    6
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            infer_mode: default_infer_mode(),
            max_text_tokens_per_sentence: default_max_text_tokens(),
            sentences_bucket_max_size: default_bucket_size(),
        }
    }
}

/// The opaque request descriptor handed to the backend.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub prompt_audio: PathBuf,
    pub text: String,
    pub params: SynthesisParams,
}

/// The seam between the gateway and the inference backend.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Synthesize speech and return the raw audio bytes.
    async fn synthesize(&self, request: &InferenceRequest) -> Result<Bytes, BackendError>;
}

/// HTTP client for the remote inference endpoint.
pub struct InferenceClient {
    base_url: String,
    http: reqwest::Client,
}

impl InferenceClient {
    /// Create a client without probing the backend.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Create a client and verify the backend is reachable, probing up to
    /// five times. Startup keeps running in degraded mode when this fails.
    pub async fn connect(base_url: &str) -> anyhow::Result<Self> {
        let client = Self::new(base_url);
        retry_fixed(CONNECT_ATTEMPTS, CONNECT_RETRY_DELAY, || client.probe())
            .await
            .with_context(|| format!("inference backend not reachable at {base_url}"))?;
        Ok(client)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn probe(&self) -> Result<(), reqwest::Error> {
        self.http
            .get(self.endpoint("config"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// One raw RPC round-trip; retried by `synthesize`.
    async fn call_predict(
        &self,
        request: &InferenceRequest,
    ) -> Result<serde_json::Value, reqwest::Error> {
        let payload = json!({
            "data": [
                { "path": request.prompt_audio },
                request.text,
                request.params.infer_mode,
                request.params.max_text_tokens_per_sentence,
                request.params.sentences_bucket_max_size,
            ]
        });

        self.http
            .post(self.endpoint("api/predict"))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await
    }
}

#[async_trait]
impl SpeechBackend for InferenceClient {
    async fn synthesize(&self, request: &InferenceRequest) -> Result<Bytes, BackendError> {
        let reply = retry_fixed(CALL_ATTEMPTS, CALL_RETRY_DELAY, || self.call_predict(request))
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        // Some backends wrap the result in a {"data": [...]} envelope.
        let result = reply
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|d| d.first())
            .unwrap_or(&reply);

        let path = normalize_result(result)?;
        debug!("backend produced audio file {}", path.display());
        collect_audio(&path).await
    }
}

/// Accepted reply shapes: an object with a `value` or `path` string field, or
/// a bare path string. Anything else is unusable.
fn normalize_result(result: &serde_json::Value) -> Result<PathBuf, BackendError> {
    let path = if let Some(obj) = result.as_object() {
        obj.get("value")
            .and_then(|v| v.as_str())
            .or_else(|| obj.get("path").and_then(|v| v.as_str()))
    } else {
        result.as_str()
    };

    match path {
        Some(p) if !p.is_empty() => Ok(PathBuf::from(p)),
        _ => Err(BackendError::InvalidResult(format!(
            "no audio file in backend reply: {result}"
        ))),
    }
}

/// Read the produced file fully, then delete it from its transient location.
/// Deletion failures are logged, never propagated.
async fn collect_audio(path: &Path) -> Result<Bytes, BackendError> {
    let audio = tokio::fs::read(path).await.map_err(|e| {
        BackendError::InvalidResult(format!(
            "cannot read produced audio file {}: {e}",
            path.display()
        ))
    })?;

    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("failed to remove transient audio file {}: {e}", path.display());
    }

    Ok(Bytes::from(audio))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_normalize_accepts_value_field() {
        let reply = json!({ "value": "/tmp/out.wav" });
        assert_eq!(
            normalize_result(&reply).unwrap(),
            PathBuf::from("/tmp/out.wav")
        );
    }

    #[test]
    fn test_normalize_accepts_path_field() {
        let reply = json!({ "path": "/tmp/out.wav" });
        assert_eq!(
            normalize_result(&reply).unwrap(),
            PathBuf::from("/tmp/out.wav")
        );
    }

    #[test]
    fn test_normalize_prefers_value_over_path() {
        let reply = json!({ "value": "/tmp/a.wav", "path": "/tmp/b.wav" });
        assert_eq!(normalize_result(&reply).unwrap(), PathBuf::from("/tmp/a.wav"));
    }

    #[test]
    fn test_normalize_accepts_bare_string() {
        let reply = json!("/tmp/out.wav");
        assert_eq!(
            normalize_result(&reply).unwrap(),
            PathBuf::from("/tmp/out.wav")
        );
    }

    #[test]
    fn test_normalize_rejects_other_shapes() {
        for reply in [json!(42), json!(null), json!(["x"]), json!({ "audio": "x" }), json!("")] {
            assert!(matches!(
                normalize_result(&reply),
                Err(BackendError::InvalidResult(_))
            ));
        }
    }

    static FILE_SEQ: AtomicU32 = AtomicU32::new(0);

    fn temp_file(contents: &[u8]) -> PathBuf {
        let seq = FILE_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "backend_core_test_{}_{}.wav",
            std::process::id(),
            seq
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_collect_audio_reads_and_deletes() {
        let path = temp_file(b"RIFF-audio");
        let audio = collect_audio(&path).await.unwrap();
        assert_eq!(audio, Bytes::from_static(b"RIFF-audio"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_collect_audio_missing_file_is_invalid_result() {
        let path = std::env::temp_dir().join("backend_core_test_never_written.wav");
        assert!(matches!(
            collect_audio(&path).await,
            Err(BackendError::InvalidResult(_))
        ));
    }

    #[test]
    fn test_params_defaults_match_backend_expectations() {
        let params = SynthesisParams::default();
        assert_eq!(params.infer_mode, "standard");
        assert_eq!(params.max_text_tokens_per_sentence, 80);
        assert_eq!(params.sentences_bucket_max_size, 6);
    }

    #[test]
    fn test_endpoint_joins_base_url_without_double_slash() {
        let client = InferenceClient::new("http://127.0.0.1:7860/");
        assert_eq!(client.endpoint("config"), "http://127.0.0.1:7860/config");
        let client = InferenceClient::new("http://127.0.0.1:7860");
        assert_eq!(client.endpoint("api/predict"), "http://127.0.0.1:7860/api/predict");
    }
}
