//! Shared state handed to every request handler.

use tc_broker::Broker;
use tokio_util::sync::CancellationToken;

/// State shared by all routes.
///
/// Cloning is cheap: the broker handle and the token are both reference
/// counted.
#[derive(Debug, Clone)]
pub struct AppState {
    broker: Broker,
    shutdown: CancellationToken,
}

impl AppState {
    /// Creates state around `broker` with a fresh shutdown token.
    #[must_use]
    pub fn new(broker: Broker) -> Self {
        Self::with_shutdown(broker, CancellationToken::new())
    }

    /// Creates state around `broker` that stops when `shutdown` is cancelled.
    #[must_use]
    pub const fn with_shutdown(broker: Broker, shutdown: CancellationToken) -> Self {
        Self { broker, shutdown }
    }

    /// Returns the broker handle.
    #[inline]
    #[must_use]
    pub const fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Returns the server-wide shutdown token.
    ///
    /// Cancelling it ends every open event stream and stops [`serve`](crate::serve).
    #[inline]
    #[must_use]
    pub const fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }
}
