//! Publish leg over SSE

use crate::api::rest::state::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;

/// Open a publish subscription. Every payload arrives as an `action` or `run`
/// event whose data is the payload JSON.
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.relay.subscribe();

    let stream = stream::unfold(subscription, |mut subscription| async move {
        match subscription.recv().await {
            Ok(published) => {
                let event = Event::default()
                    .event(published.kind.name())
                    .data(&*published.data);
                Some((Ok(event), subscription))
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(subscriber = %subscription.id(), skipped, "Publish subscriber lagged");
                Some((Ok(Event::default().comment("lagged")), subscription))
            }
            Err(RecvError::Closed) => None,
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.relay.config().keep_alive())
            .text("ping"),
    )
}
