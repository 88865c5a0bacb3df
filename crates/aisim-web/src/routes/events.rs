use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;

use super::api::StateResponse;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/events", get(events))
}

/// Server-sent events carrying the full state after every store change.
///
/// A slow client only ever misses intermediate snapshots; the latest one is
/// always delivered.
async fn events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.store.subscribe()).map(|snapshot| {
        let version = snapshot.version;
        let event = Event::default()
            .event("state")
            .id(version.to_string())
            .json_data(StateResponse::from(snapshot))
            .unwrap_or_else(|e| {
                tracing::error!("failed to encode state event: {e}");
                Event::default().event("error").data("state encoding failed")
            });
        Ok(event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
