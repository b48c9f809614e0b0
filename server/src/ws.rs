//! Live duplex connections and idle-signal broadcast.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::stream::SplitSink;
use futures_util::{future, SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::AppState;

/// Registry of live connections, generic over the send half so tests can
/// register plain channel senders.
pub struct ConnectionRegistry<S> {
    connections: Mutex<HashMap<u64, Arc<tokio::sync::Mutex<S>>>>,
    next_id: AtomicU64,
}

/// The registry instantiation used by the running server.
pub type WsRegistry = ConnectionRegistry<SplitSink<WebSocket, Message>>;

impl<S> ConnectionRegistry<S>
where
    S: futures_util::Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
{
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a connection. It is visible to the very next `broadcast` call.
    pub fn register(&self, sink: S) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections
            .lock()
            .unwrap()
            .insert(id, Arc::new(tokio::sync::Mutex::new(sink)));
        id
    }

    /// Remove a connection. Returns false when it was already gone
    /// (disconnected during a broadcast, or unregistered twice).
    pub fn unregister(&self, id: u64) -> bool {
        self.connections.lock().unwrap().remove(&id).is_some()
    }

    pub fn count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// Send `message` to every registered connection concurrently and return
    /// how many deliveries succeeded.
    ///
    /// Membership is snapshotted at call start, so registrations and removals
    /// during the sends are tolerated. A connection whose send fails is
    /// dropped from the registry within this same call; individual failures
    /// never surface to the caller.
    pub async fn broadcast(&self, message: &str) -> usize {
        let targets: Vec<(u64, Arc<tokio::sync::Mutex<S>>)> = {
            let connections = self.connections.lock().unwrap();
            connections
                .iter()
                .map(|(id, sink)| (*id, sink.clone()))
                .collect()
        };

        if targets.is_empty() {
            debug!("no connections registered, skipping broadcast");
            return 0;
        }

        let sends = targets.into_iter().map(|(id, sink)| {
            let text = message.to_owned();
            async move {
                let mut sink = sink.lock().await;
                (id, sink.send(Message::Text(text.into())).await)
            }
        });
        let results = future::join_all(sends).await;

        let mut delivered = 0;
        let mut dropped = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("failed to send to connection {id}: {e}");
                    dropped.push(id);
                }
            }
        }

        if !dropped.is_empty() {
            let mut connections = self.connections.lock().unwrap();
            for id in &dropped {
                connections.remove(id);
            }
        }

        info!(
            "broadcast '{message}' delivered to {delivered} connection(s), dropped {}",
            dropped.len()
        );
        delivered
    }
}

pub async fn ws_endpoint(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.registry.clone()))
}

/// Keep the connection registered until the client goes away. The read half
/// only watches for disconnection; all outbound traffic is broadcast-driven.
async fn handle_socket(socket: WebSocket, registry: Arc<WsRegistry>) {
    let (sink, mut stream) = socket.split();
    let id = registry.register(sink);
    info!("websocket client {id} connected, {} total", registry.count());

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    if registry.unregister(id) {
        info!(
            "websocket client {id} disconnected, {} remaining",
            registry.count()
        );
    }
}
