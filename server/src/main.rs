use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Instant};

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer,
};
use tracing::{error, info, warn};

use backend_core::{InferenceClient, SpeechBackend};
use speech_core::{ResponseCache, VoiceCatalog};

use server::config::ServerConfig;
use server::metrics::{ServiceMetrics, START_TIME};
use server::monitor::{spawn_idle_monitor, ActivityTracker};
use server::ws::WsRegistry;
use server::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting speech relay server...");

    let config = ServerConfig::from_env();
    info!(
        "Server configuration loaded: port={}, cache={} entries, idle threshold={}s, poll={}s",
        config.port,
        config.max_cache_entries,
        config.inactivity_threshold_secs,
        config.monitor_poll_interval_secs
    );

    let voices = Arc::new(
        VoiceCatalog::from_mapfile(
            &config.voice_map_path,
            Some(config.default_prompt_audio.clone()),
        )
        .unwrap_or_else(|e| {
            warn!(
                "Could not load {}: {e}, using empty voice catalog.",
                config.voice_map_path
            );
            VoiceCatalog::new(HashMap::new(), Some(config.default_prompt_audio.clone()))
        }),
    );
    info!("Loaded {} reference voice(s)", voices.models().len());

    // A failed probe leaves the service degraded but running; /health reflects it.
    let backend: Option<Arc<dyn SpeechBackend>> =
        match InferenceClient::connect(&config.backend_url).await {
            Ok(client) => {
                info!("Connected to inference backend at {}", config.backend_url);
                Some(Arc::new(client))
            }
            Err(e) => {
                error!("Inference backend not connected: {e}; serving in degraded mode");
                None
            }
        };

    // Initialize start time for uptime calculation
    let _ = START_TIME.get_or_init(Instant::now);

    let state = AppState {
        backend,
        voices,
        cache: Arc::new(tokio::sync::Mutex::new(ResponseCache::new(
            config.max_cache_entries,
        ))),
        registry: Arc::new(WsRegistry::new()),
        activity: Arc::new(ActivityTracker::new()),
        metrics: Arc::new(ServiceMetrics::new()),
        config: config.clone(),
    };

    let monitor = spawn_idle_monitor(
        state.activity.clone(),
        state.registry.clone(),
        config.inactivity_threshold(),
        config.monitor_poll_interval(),
    );

    // CORS configuration - environment-aware
    let cors = if let Some(ref allowed_origins) = config.cors_allowed_origins {
        // Production: Use specific origins from environment
        let origins: Vec<axum::http::HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin: &String| origin.parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(tower_http::cors::Any)
                .allow_credentials(false)
        } else {
            info!("CORS configured for {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(tower_http::cors::AllowOrigin::list(origins))
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(tower_http::cors::Any)
                .allow_credentials(false)
        }
    } else {
        // Development: Allow all origins (with warning)
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(tower_http::cors::Any)
            .allow_credentials(false)
    };

    // Rate limiting configuration
    // Using GlobalKeyExtractor to rate limit globally (all requests share the same limit)
    // This works better in Docker/proxy environments where IP extraction can be problematic
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second((config.rate_limit_per_minute / 60) as u64)
            .burst_size(config.rate_limit_per_minute)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .unwrap(),
    );
    info!("Rate limiting: {} requests per minute", config.rate_limit_per_minute);

    // Request ID middleware for tracing
    async fn add_request_id(mut request: Request, next: Next) -> Response {
        let request_id = uuid::Uuid::new_v4().to_string();
        request.headers_mut().insert(
            "x-request-id",
            axum::http::HeaderValue::from_str(&request_id).unwrap(),
        );
        let mut response = next.run(request).await;
        response.headers_mut().insert(
            "x-request-id",
            axum::http::HeaderValue::from_str(&request_id).unwrap(),
        );
        response
    }

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors)
        .into_inner();

    let router = app(state)
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT."))?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Join the monitor before declaring the process stopped.
    monitor.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        return;
    }
    info!("Shutdown signal received");
}
