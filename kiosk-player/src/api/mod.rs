//! HTTP API for the kiosk player
//!
//! Ingestion endpoints validate producer input and enqueue items; display
//! clients subscribe to `GET /events` and fetch uploaded files from
//! `/uploads`.

pub mod handlers;
pub mod sse;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::playback::Scheduler;
use crate::sse::SseBroadcaster;
use crate::uploads::{UploadStore, UPLOADS_ROUTE};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Playback scheduler handle (enqueue side)
    pub scheduler: Scheduler,
    /// Display event stream
    pub broadcaster: SseBroadcaster,
    /// Storage for `*-by-file` uploads
    pub uploads: Arc<UploadStore>,
}

impl AppState {
    pub fn new(scheduler: Scheduler, broadcaster: SseBroadcaster, uploads: UploadStore) -> Self {
        Self {
            scheduler,
            broadcaster,
            uploads: Arc::new(uploads),
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.uploads.max_bytes());
    let upload_files = ServeDir::new(state.uploads.dir());

    Router::new()
        // Health check
        .route("/health", get(handlers::health))

        // Ingestion
        .route("/api/queue", post(handlers::enqueue_item))
        .route("/api/upload/image-by-link", post(handlers::enqueue_image_link))
        .route("/api/upload/video-by-link", post(handlers::enqueue_video_link))
        .route(
            "/api/upload/image-by-file",
            post(handlers::enqueue_image_file).layer(upload_limit.clone()),
        )
        .route(
            "/api/upload/video-by-file",
            post(handlers::enqueue_video_file).layer(upload_limit),
        )

        // Uploaded assets
        .nest_service(UPLOADS_ROUTE, upload_files)

        // Display clients
        .route("/events", get(sse::event_stream))

        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
