//! Background idle-activity monitor.

use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::ws::Message;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::ws::ConnectionRegistry;

/// Literal payload broadcast to observers when the service has been idle.
pub const IDLE_SIGNAL: &str = "stop edge";

/// Process-wide last-activity marker. Written by every synthesis request and
/// by the monitor itself after it notifies; plain last-write-wins.
pub struct ActivityTracker {
    last_activity: Mutex<Instant>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self {
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        *self.last_activity.lock().unwrap() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().unwrap().elapsed()
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the spawned monitor loop. Shutdown signals the loop and joins
/// it, so the process never exits with a dangling iteration.
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("idle monitor task failed to join: {e}");
        }
    }
}

/// Spawn the perpetual idle-watch loop.
///
/// Every `poll_interval` the loop compares the tracker against `threshold`;
/// on a crossing it broadcasts [`IDLE_SIGNAL`] and re-arms the tracker so the
/// next notification requires a fresh idle period. Cancellation is honored at
/// the sleep boundary; an in-progress tick finishes its broadcast first.
pub fn spawn_idle_monitor<S>(
    tracker: Arc<ActivityTracker>,
    registry: Arc<ConnectionRegistry<S>>,
    threshold: Duration,
    poll_interval: Duration,
) -> MonitorHandle
where
    S: futures_util::Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
{
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("idle monitor stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let idle = tracker.idle_for();
                    if idle > threshold {
                        let delivered = registry.broadcast(IDLE_SIGNAL).await;
                        info!(
                            "idle for {}s, notified {delivered} connection(s)",
                            idle.as_secs()
                        );
                        tracker.touch();
                    }
                }
            }
        }
    });

    MonitorHandle { shutdown, task }
}
