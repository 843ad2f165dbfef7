//! Subscriber identity and the receiving end of a delivery endpoint.

use std::fmt;

use tc_core::Message;
use tokio::sync::mpsc;

/// Identifies one registered subscriber.
///
/// Ids are allocated by the broker handle and never reused within a broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl SubscriberId {
    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// The receiving side of a subscriber's delivery endpoint.
///
/// Returned by [`Broker::subscribe`](crate::Broker::subscribe). Messages
/// arrive in publish order. [`recv`](Self::recv) returns `None` once the
/// broker has closed the endpoint, which happens after the subscriber is
/// unsubscribed or the broker shuts down.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Message>,
}

impl Subscription {
    pub(crate) const fn new(id: SubscriberId, rx: mpsc::Receiver<Message>) -> Self {
        Self { id, rx }
    }

    /// Returns the id to pass to [`Broker::unsubscribe`](crate::Broker::unsubscribe).
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Receives the next message, or `None` once the endpoint is closed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Splits the subscription into its id and raw receiver.
    #[must_use]
    pub fn into_parts(self) -> (SubscriberId, mpsc::Receiver<Message>) {
        (self.id, self.rx)
    }
}
