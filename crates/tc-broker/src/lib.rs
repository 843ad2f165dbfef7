//! Serialized fan-out broker for streaming messages to subscribers.
//!
//! This crate is the hub between the file watcher and the connected
//! clients. A single dispatch task owns the set of active subscribers and
//! processes subscribe, unsubscribe and publish commands strictly in the
//! order they arrive.
//!
//! # Overview
//!
//! - [`Broker`]: cloneable handle; `subscribe`, `unsubscribe`, `publish`
//! - [`Subscription`]: the receiving end of one subscriber's endpoint
//! - [`BrokerStats`] / [`StatsSnapshot`]: counters for subscribers,
//!   deliveries and detected delivery stalls
//!
//! # Guarantees
//!
//! - A subscriber registered before a publish is processed receives it.
//! - A subscriber unsubscribed before a publish is processed does not.
//! - Unsubscribing twice is the same as unsubscribing once.
//! - Each publish produces exactly one delivery per active subscriber.
//!
//! # Known Limitation: Delivery Stall
//!
//! Fan-out is synchronous. A subscriber whose channel is full blocks the
//! dispatch loop, and with it every other subscriber and every pending
//! subscribe or unsubscribe, until it reads again or its receiver is
//! dropped. Stalls longer than
//! [`BrokerConfig::stall_warn_ms`](tc_core::BrokerConfig::stall_warn_ms)
//! are logged and counted in [`StatsSnapshot::stalls`].
//!
//! # Example
//!
//! ```
//! use tc_broker::Broker;
//! use tc_core::{BrokerConfig, Message};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tc_broker::BrokerError> {
//! let (broker, task) = Broker::start(&BrokerConfig::default());
//!
//! let mut a = broker.subscribe().await?;
//! let mut b = broker.subscribe().await?;
//! broker.publish(Message::new(0, "to everyone")).await?;
//!
//! assert_eq!(a.recv().await.map(|m| m.offset()), Some(0));
//! assert_eq!(b.recv().await.map(|m| m.offset()), Some(0));
//!
//! broker.shutdown();
//! task.await.ok();
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod broker;
mod error;
mod stats;
mod subscription;

pub use broker::Broker;
pub use error::BrokerError;
pub use stats::{BrokerStats, StatsSnapshot};
pub use subscription::{SubscriberId, Subscription};
