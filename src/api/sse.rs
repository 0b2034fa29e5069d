//! Server-Sent Events support

use crate::stream::{FrameStream, StreamFrame};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::StreamExt;

/// Each frame becomes one `data:` record; the stream closes after `[DONE]`.
pub fn sse_stream(frames: FrameStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = frames.map(|frame| Ok(frame_to_axum(&frame)));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn frame_to_axum(frame: &StreamFrame) -> Event {
    Event::default().data(frame.data())
}
