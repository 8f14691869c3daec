//! GET /events - display event stream

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use super::AppState;

/// Streams `play` events to a display client until it disconnects
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    state.broadcaster.handle_sse_connection()
}
