//! Messages produced by the file watcher and the sink they are pushed into.
//!
//! A [`Message`] is one complete line appended to the watched file. It is
//! immutable once created; the line text is reference counted so fanning a
//! message out to many subscribers clones a pointer, not the text.
//!
//! # Examples
//!
//! ```
//! use tc_core::Message;
//!
//! let message = Message::new(0, "hello");
//! assert_eq!(message.offset(), 0);
//! assert_eq!(message.line(), "hello");
//! assert_eq!(message.payload(), "Pos: 0, Scanned: hello\n");
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

/// One appended line of the watched file.
///
/// `offset` is the byte position in the file at which the line starts. The
/// line text excludes its terminator (`\n` or `\r\n`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    offset: u64,
    line: Arc<str>,
}

impl Message {
    /// Creates a message for a line starting at `offset`.
    #[inline]
    #[must_use]
    pub fn new(offset: u64, line: impl Into<Arc<str>>) -> Self {
        Self {
            offset,
            line: line.into(),
        }
    }

    /// Returns the byte offset at which the line starts.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the line text without its terminator.
    #[inline]
    #[must_use]
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Renders the payload pushed to subscribers.
    ///
    /// The payload is `Pos: <offset>, Scanned: <line>` followed by a newline.
    #[must_use]
    pub fn payload(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pos: {}, Scanned: {}", self.offset, self.line)
    }
}

/// Returned by a [`MessageSink`] whose receiving side has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("message sink closed")]
pub struct SinkClosed;

/// Destination for messages emitted by the file watcher.
///
/// `deliver` resolves once the message has been accepted (enqueued), not once
/// it has reached any final consumer. Implementations must preserve the order
/// in which messages are delivered.
///
/// # Examples
///
/// ```
/// use tc_core::{Message, MessageSink};
/// use tokio::sync::mpsc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let (tx, mut rx) = mpsc::channel(4);
/// tx.deliver(Message::new(0, "hello")).await.unwrap();
/// assert_eq!(rx.recv().await.map(|m| m.offset()), Some(0));
/// # }
/// ```
pub trait MessageSink: Send + Sync + 'static {
    /// Hands one message to the sink.
    fn deliver(&self, message: Message) -> impl Future<Output = Result<(), SinkClosed>> + Send;
}

impl MessageSink for mpsc::Sender<Message> {
    async fn deliver(&self, message: Message) -> Result<(), SinkClosed> {
        mpsc::Sender::send(self, message)
            .await
            .map_err(|_| SinkClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_payload_format() {
        let message = Message::new(42, "GET /index.html 200");
        assert_eq!(message.payload(), "Pos: 42, Scanned: GET /index.html 200\n");
    }

    #[test]
    fn test_message_empty_line() {
        let message = Message::new(7, "");
        assert_eq!(message.line(), "");
        assert_eq!(message.payload(), "Pos: 7, Scanned: \n");
    }

    #[test]
    fn test_message_clone_shares_line() {
        let message = Message::new(0, "shared");
        let copy = message.clone();
        assert_eq!(message, copy);
        assert!(Arc::ptr_eq(&message.line, &copy.line));
    }

    #[test]
    fn test_sink_closed_display() {
        assert_eq!(SinkClosed.to_string(), "message sink closed");
    }

    #[tokio::test]
    async fn test_bounded_sender_sink_preserves_order() {
        let (tx, mut rx) = mpsc::channel(8);
        for i in 0..3u64 {
            tx.deliver(Message::new(i, format!("line {i}")))
                .await
                .expect("sink should accept");
        }
        drop(tx);

        let mut offsets = Vec::new();
        while let Some(message) = rx.recv().await {
            offsets.push(message.offset());
        }
        assert_eq!(offsets, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_sink_reports_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let result = tx.deliver(Message::new(0, "lost")).await;
        assert_eq!(result, Err(SinkClosed));
    }
}
