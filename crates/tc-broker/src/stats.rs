//! Broker statistics with atomic counters.
//!
//! The dispatch loop is the only writer; any handle can take a
//! [`StatsSnapshot`] without going through the command queue.
//!
//! # Thread Safety
//!
//! All counters use [`AtomicU64`] with [`Relaxed`](std::sync::atomic::Ordering::Relaxed)
//! ordering. Statistics are informational and never used to make delivery
//! decisions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters for broker activity.
#[derive(Debug, Default)]
pub struct BrokerStats {
    /// Subscribers currently registered.
    active: AtomicU64,
    /// Subscribe commands processed.
    subscribed: AtomicU64,
    /// Subscribers removed (unsubscribe, or receiver dropped).
    unsubscribed: AtomicU64,
    /// Publish commands processed.
    published: AtomicU64,
    /// Individual message deliveries into subscriber channels.
    deliveries: AtomicU64,
    /// Deliveries that exceeded the stall reporting threshold.
    stalls: AtomicU64,
}

impl BrokerStats {
    /// Creates a new [`BrokerStats`] with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_subscribe(&self) {
        self.subscribed.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unsubscribe(&self) {
        self.unsubscribed.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn record_publish(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stall(&self) {
        self.stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn clear_active(&self) {
        self.active.store(0, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of all statistics.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            active: self.active.load(Ordering::Relaxed),
            subscribed: self.subscribed.load(Ordering::Relaxed),
            unsubscribed: self.unsubscribed.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            stalls: self.stalls.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of broker statistics.
///
/// # Examples
///
/// ```
/// use tc_broker::StatsSnapshot;
///
/// let snap = StatsSnapshot {
///     active: 2,
///     subscribed: 3,
///     unsubscribed: 1,
///     published: 10,
///     deliveries: 25,
///     stalls: 0,
/// };
///
/// assert!(!snap.has_stalled());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Subscribers currently registered.
    pub active: u64,
    /// Subscribe commands processed.
    pub subscribed: u64,
    /// Subscribers removed.
    pub unsubscribed: u64,
    /// Messages published.
    pub published: u64,
    /// Individual deliveries into subscriber channels.
    pub deliveries: u64,
    /// Deliveries reported as stalled.
    pub stalls: u64,
}

impl StatsSnapshot {
    /// Returns `true` if any delivery has ever exceeded the stall threshold.
    #[inline]
    #[must_use]
    pub const fn has_stalled(&self) -> bool {
        self.stalls > 0
    }
}
