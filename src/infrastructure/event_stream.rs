// Event-stream response utilities
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::Stream;
use std::convert::Infallible;

pub const EVENT_STREAM: &str = "text/event-stream";

/// Wrap a stream of events in a long-lived `text/event-stream` response.
///
/// `Sse` sets the content type and `no-cache`. No keep-alive comments are
/// interleaved, so every frame on the wire is a reading. The body stream is
/// owned by the connection and dropped with it when the peer goes away.
pub fn event_stream_response<S>(events: S) -> Response
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    ([(header::CONNECTION, "keep-alive")], Sse::new(events)).into_response()
}
