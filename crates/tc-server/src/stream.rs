//! Per-connection Server-Sent Events handler.
//!
//! Each request to `/events/` becomes one broker subscriber for as long as
//! the connection stays open.
//!
//! # Connection Lifecycle
//!
//! ```text
//! request ──► reject HTTP/1.0 ──► Broker::subscribe ──► response body stream
//!                                        │                     │
//!                                        │        one chunk per message
//!                                        │                     │
//!                     teardown task ◄── drop guard ◄── body dropped (peer gone)
//!                          │                            or server shutdown
//!                          ▼
//!               Broker::unsubscribe (once)
//!                          │
//!                          ▼
//!            endpoint closed ──► body stream ends
//! ```
//!
//! # Wire Format
//!
//! Every message becomes exactly one frame: `data: Message: <payload>\n\n`.
//! The payload already ends with a newline, so a frame ends with three.
//! No `id:`, `retry:` or `event:` fields are sent.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Version, header};
use axum::response::{IntoResponse, Response};
use tc_core::Message;
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;
use tracing::{debug, info};

use crate::error::StreamError;
use crate::state::AppState;

/// Content type of the event stream.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Renders one message as a push-stream frame.
///
/// # Examples
///
/// ```
/// use tc_core::Message;
/// use tc_server::frame;
///
/// let frame = frame(&Message::new(0, "hello"));
/// assert_eq!(frame, "data: Message: Pos: 0, Scanned: hello\n\n\n");
/// ```
#[must_use]
pub fn frame(message: &Message) -> String {
    format!("data: Message: {message}\n\n")
}

/// Handles `GET /events/`.
///
/// Rejects transports that cannot flush incrementally, registers a
/// subscriber, and streams its messages until the broker closes the
/// endpoint.
pub async fn stream_events(
    State(state): State<AppState>,
    version: Version,
) -> Result<Response, StreamError> {
    if matches!(version, Version::HTTP_09 | Version::HTTP_10) {
        debug!(?version, "Rejecting event stream over non-chunked transport");
        return Err(StreamError::TransportUnsupported { version });
    }

    let subscription = state.broker().subscribe().await?;
    let (id, rx) = subscription.into_parts();

    // Cancelled when the body is dropped or the server shuts down
    let teardown = state.shutdown_token().child_token();
    let guard = teardown.clone().drop_guard();

    let broker = state.broker().clone();
    tokio::spawn(async move {
        teardown.cancelled().await;
        if let Err(e) = broker.unsubscribe(id).await {
            debug!(subscriber = %id, error = %e, "Unsubscribe after broker shutdown");
        }
        info!(subscriber = %id, "HTTP connection just closed");
    });

    info!(subscriber = %id, "Event stream opened");

    let headers = [
        (header::CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE),
        (header::CACHE_CONTROL, "no-cache"),
    ];
    Ok((headers, Body::from_stream(frames(rx, guard))).into_response())
}

/// Turns a subscriber endpoint into a stream of encoded frames.
///
/// The drop guard travels with the stream, so dropping the response body
/// for any reason cancels the connection's teardown token.
fn frames(
    rx: mpsc::Receiver<Message>,
    guard: DropGuard,
) -> impl futures_util::Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    futures_util::stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let message = rx.recv().await?;
        Some((Ok(Bytes::from(frame(&message))), (rx, guard)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_format() {
        let message = Message::new(128, "GET /healthz 200");
        assert_eq!(
            frame(&message),
            "data: Message: Pos: 128, Scanned: GET /healthz 200\n\n\n"
        );
    }

    #[test]
    fn test_frame_has_no_extra_fields() {
        let rendered = frame(&Message::new(0, "x"));
        assert!(rendered.starts_with("data: "));
        assert!(!rendered.contains("id:"));
        assert!(!rendered.contains("retry:"));
        assert!(!rendered.contains("event:"));
    }
}
