// Configuration constants for the server

use std::path::PathBuf;
use std::time::Duration;

use speech_core::DEFAULT_CACHE_CAPACITY;

#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub backend_url: String,
    pub voice_map_path: String,
    pub default_prompt_audio: PathBuf,
    pub max_cache_entries: usize,
    pub inactivity_threshold_secs: u64,
    pub monitor_poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub rate_limit_per_minute: u32,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8010,
            backend_url: "http://127.0.0.1:7860/".to_string(),
            voice_map_path: "model_wav/map.json".to_string(),
            default_prompt_audio: PathBuf::from("model_wav/default_prompt.wav"),
            max_cache_entries: DEFAULT_CACHE_CAPACITY,
            inactivity_threshold_secs: 1800,
            monitor_poll_interval_secs: 60,
            request_timeout_secs: 60,
            rate_limit_per_minute: 60,
            cors_allowed_origins: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let backend_url = std::env::var("BACKEND_URL").unwrap_or(defaults.backend_url);

        let voice_map_path = std::env::var("VOICE_MAP_PATH").unwrap_or(defaults.voice_map_path);

        let default_prompt_audio = std::env::var("DEFAULT_PROMPT_AUDIO")
            .map(PathBuf::from)
            .unwrap_or(defaults.default_prompt_audio);

        let max_cache_entries = std::env::var("MAX_CACHE_ENTRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_cache_entries);

        let inactivity_threshold_secs = std::env::var("INACTIVITY_THRESHOLD_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.inactivity_threshold_secs);

        let monitor_poll_interval_secs = std::env::var("MONITOR_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.monitor_poll_interval_secs);

        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);

        let rate_limit_per_minute = std::env::var("RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.rate_limit_per_minute);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| origins.split(',').map(|s| s.trim().to_string()).collect());

        Self {
            port,
            backend_url,
            voice_map_path,
            default_prompt_audio,
            max_cache_entries,
            inactivity_threshold_secs,
            monitor_poll_interval_secs,
            request_timeout_secs,
            rate_limit_per_minute,
            cors_allowed_origins,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_threshold_secs)
    }

    pub fn monitor_poll_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_poll_interval_secs)
    }
}
