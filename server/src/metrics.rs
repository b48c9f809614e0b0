// Metrics collection and tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

pub static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Service-level counters.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    pub request_count: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub backend_calls: AtomicU64,
    pub backend_failures: AtomicU64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_call(&self, ok: bool) {
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.backend_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            return 0.0;
        }
        (hits as f64 / total as f64) * 100.0
    }
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub memory_usage_percent: f32,
    pub uptime_seconds: u64,
    pub request_count: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub backend_calls: u64,
    pub backend_failures: u64,
    pub active_connections: usize,
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    let mut system = sysinfo::System::new();
    system.refresh_cpu();
    system.refresh_memory();

    // Get CPU usage (average across all cores)
    let cpu_usage = system.global_cpu_info().cpu_usage();

    // Get memory information
    let memory_used = system.used_memory();
    let memory_total = system.total_memory();
    let memory_usage_percent = if memory_total > 0 {
        (memory_used as f64 / memory_total as f64 * 100.0) as f32
    } else {
        0.0
    };

    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    let metrics = &state.metrics;
    Json(MetricsResponse {
        timestamp: Utc::now(),
        cpu_usage_percent: cpu_usage,
        memory_used_mb: memory_used / 1024 / 1024, // Convert bytes to MB
        memory_total_mb: memory_total / 1024 / 1024,
        memory_usage_percent,
        uptime_seconds: uptime,
        request_count: metrics.request_count.load(Ordering::Relaxed),
        cache_hits: metrics.cache_hits.load(Ordering::Relaxed),
        cache_misses: metrics.cache_misses.load(Ordering::Relaxed),
        cache_hit_rate: metrics.cache_hit_rate(),
        backend_calls: metrics.backend_calls.load(Ordering::Relaxed),
        backend_failures: metrics.backend_failures.load(Ordering::Relaxed),
        active_connections: state.registry.count(),
    })
}
