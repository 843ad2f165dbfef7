//! Error types for the tc-broker crate.

/// Errors returned by [`Broker`](crate::Broker) handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// The dispatch loop is no longer running.
    ///
    /// Returned after [`Broker::shutdown`](crate::Broker::shutdown), or if the
    /// dispatch task panicked.
    #[error("broker dispatch loop is not running")]
    Closed,
}
