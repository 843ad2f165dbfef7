//! Batches of messages produced by a single poll cycle.
//!
//! # Event Flow
//!
//! ```text
//! File grows on disk
//!        │
//!        ▼
//! WatchState::poll (one tick)
//!        │
//!        ▼
//!   LineBatch (complete lines only, file order)
//!        │
//!        ▼
//!   MessageSink::deliver, one message at a time
//! ```

use smallvec::SmallVec;
use tc_core::Message;

/// The complete lines found by one poll cycle, in file order.
///
/// # Memory Efficiency
///
/// Uses [`SmallVec`] with inline storage for up to 8 messages, avoiding heap
/// allocation for the common case of a handful of lines per tick.
///
/// # Examples
///
/// ```
/// use tc_core::Message;
/// use tc_watcher::LineBatch;
///
/// let mut batch = LineBatch::new();
/// batch.push(Message::new(0, "first"));
/// batch.push(Message::new(6, "second"));
///
/// assert_eq!(batch.len(), 2);
/// assert_eq!(batch.end_offset(), Some(6));
/// ```
#[derive(Debug, Clone)]
pub struct LineBatch {
    /// The messages in this batch.
    pub messages: SmallVec<[Message; 8]>,
}

impl LineBatch {
    /// Creates a new empty batch.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: SmallVec::new(),
        }
    }

    /// Adds a message to the end of the batch.
    #[inline]
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns the number of lines in this batch.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the poll found no complete lines.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns an iterator over the messages.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Returns the start offset of the last line, if any.
    #[must_use]
    pub fn end_offset(&self) -> Option<u64> {
        self.messages.last().map(Message::offset)
    }

    /// Returns the line texts, mostly useful in tests and diagnostics.
    #[must_use]
    pub fn lines(&self) -> Vec<&str> {
        self.messages.iter().map(Message::line).collect()
    }
}

impl Default for LineBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoIterator for LineBatch {
    type Item = Message;
    type IntoIter = smallvec::IntoIter<[Message; 8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

impl<'a> IntoIterator for &'a LineBatch {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
