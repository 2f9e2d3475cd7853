//! Server-sent store events.
//!
//! A push-side convenience only; the pull signal remains authoritative, and a
//! lagging subscriber simply misses events.

use super::state::AppState;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

pub(crate) async fn store_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let prompts = BroadcastStream::new(state.stores.prompts.subscribe());
    let previews = BroadcastStream::new(state.stores.previews.subscribe());

    let stream = prompts.merge(previews).filter_map(|received| match received {
        Ok(event) => Event::default()
            .event(event.store.as_str())
            .json_data(&event)
            .ok()
            .map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            debug!(skipped, "Event subscriber lagged");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
