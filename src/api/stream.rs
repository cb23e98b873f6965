use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;

use crate::channel::BoundedUpdateChannel;
use crate::types::UpdateMessage;

/// Per-connection adapter: waits on the channel and renders every update as
/// one `data: <json>` frame. Runs until the client goes away and the server
/// drops the stream.
pub fn event_stream(
    channel: Arc<BoundedUpdateChannel>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            let update = channel.get().await;
            match render_event(&update) {
                Ok(event) => yield Ok(event),
                Err(e) => {
                    log::error!("Failed to render {} update for stream: {}", update.kind.as_str(), e);
                    continue;
                }
            }
        }
    }
}

pub fn render_event(update: &UpdateMessage) -> Result<Event, axum::Error> {
    Event::default().json_data(update)
}

pub fn sse_response(
    channel: Arc<BoundedUpdateChannel>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(event_stream(channel)).keep_alive(KeepAlive::default())
}
