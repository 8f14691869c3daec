//! SSE broadcaster for display clients

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use kiosk_common::events::DisplayEvent;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::playback::BroadcastSink;

/// SSE Broadcaster manages client connections and event distribution
#[derive(Clone)]
pub struct SseBroadcaster {
    tx: broadcast::Sender<DisplayEvent>,
    keep_alive: Duration,
    /// Flipped to true to end every open stream (server shutdown)
    closed: Arc<watch::Sender<bool>>,
}

impl SseBroadcaster {
    /// Create a new SSE broadcaster
    ///
    /// # Arguments
    ///
    /// * `capacity` - Events buffered per slow client before it starts lagging
    /// * `keep_alive` - Interval between keep-alive comments
    pub fn new(capacity: usize, keep_alive: Duration) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        let (closed, _) = watch::channel(false);
        info!("SSE broadcaster initialized with capacity {}", capacity);
        Self {
            tx,
            keep_alive,
            closed: Arc::new(closed),
        }
    }

    /// End all open client streams so graceful shutdown can complete
    pub fn close(&self) {
        self.closed.send_replace(true);
        info!("SSE broadcaster closed");
    }

    /// Get current number of connected clients
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Raw receiver, for in-process consumers
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.tx.subscribe()
    }

    /// Create an SSE stream for a new client connection
    pub fn subscribe_stream(&self) -> impl Stream<Item = Result<Event, Infallible>> {
        let stream = BroadcastStream::new(self.tx.subscribe());
        let mut closed = self.closed.subscribe();

        stream
            .take_until(async move {
                let _ = closed.wait_for(|done| *done).await;
            })
            .filter_map(|result| async move {
                match result {
                    Ok(event) => to_sse_event(&event).map(Ok),
                    Err(e) => {
                        // Lagged: the client missed events, keep streaming
                        warn!("SSE client error: {:?}", e);
                        None
                    }
                }
            })
    }

    /// Axum SSE response for GET /events
    pub fn handle_sse_connection(&self) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        let stream = self.subscribe_stream();
        info!("New SSE client connected, total clients: {}", self.client_count());

        Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(self.keep_alive)
                .text("keep-alive"),
        )
    }
}

impl BroadcastSink for SseBroadcaster {
    fn emit(&self, event: DisplayEvent) {
        // No receivers is fine: nobody is watching the screen
        match self.tx.send(event) {
            Ok(count) => debug!("Broadcast event to {} clients", count),
            Err(_) => debug!("Broadcast with no connected clients"),
        }
    }
}

/// Convert a display event to an SSE frame (`event`, `id`, JSON `data`)
pub fn to_sse_event(event: &DisplayEvent) -> Option<Event> {
    match event.data() {
        Ok(data) => Some(
            Event::default()
                .event(event.event_name())
                .id(event.id().to_string())
                .data(data),
        ),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}
