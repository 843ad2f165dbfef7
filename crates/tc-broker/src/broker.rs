//! The broker handle and its serialized dispatch loop.
//!
//! # Architecture
//!
//! ```text
//! Publishers / handlers (many):         Dispatch loop (one task):
//!
//!   FileWatcher ── publish ─────┐
//!   handler 1 ─── subscribe ────┼──► command queue ──► Dispatcher ──► sub-1 channel
//!   handler 2 ─── unsubscribe ──┘     (FIFO, bounded)   (owns set)  ├─► sub-2 channel
//!                                                                    └─► sub-N channel
//! ```
//!
//! ## Rules
//! - **Single owner**: only the dispatch loop reads or writes the subscriber
//!   set. There is no lock around it.
//! - **Total order**: subscribe, unsubscribe and publish share one FIFO
//!   queue, so every command is observed in arrival order.
//! - **Synchronous fan-out**: a publish awaits delivery into each subscriber
//!   channel in turn. A subscriber whose channel is full holds up every other
//!   subscriber and every queued command until it drains.
//! - **Stall reporting**: a delivery that takes longer than
//!   [`BrokerConfig::stall_warn_ms`] is logged and counted, then awaited to
//!   completion. Nothing is dropped or skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rustc_hash::FxHashMap;
use tc_core::{BrokerConfig, Message, MessageSink, SinkClosed};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::BrokerError;
use crate::stats::{BrokerStats, StatsSnapshot};
use crate::subscription::{SubscriberId, Subscription};

/// Commands consumed by the dispatch loop.
#[derive(Debug)]
enum Command {
    Subscribe {
        id: SubscriberId,
        tx: mpsc::Sender<Message>,
    },
    Unsubscribe(SubscriberId),
    Publish(Message),
}

/// Cloneable handle to a running broker.
///
/// The only way to obtain a `Broker` is [`Broker::start`], which spawns the
/// dispatch loop, so a broker is started exactly once. Clones share the same
/// dispatch loop.
///
/// # Examples
///
/// ```
/// use tc_broker::Broker;
/// use tc_core::{BrokerConfig, Message};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tc_broker::BrokerError> {
/// let (broker, _task) = Broker::start(&BrokerConfig::default());
///
/// let mut subscription = broker.subscribe().await?;
/// broker.publish(Message::new(0, "hello")).await?;
///
/// let message = subscription.recv().await;
/// assert_eq!(message.map(|m| m.payload()), Some("Pos: 0, Scanned: hello\n".to_owned()));
///
/// broker.unsubscribe(subscription.id()).await?;
/// assert!(subscription.recv().await.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Broker {
    commands: mpsc::Sender<Command>,
    next_id: Arc<AtomicU64>,
    subscriber_capacity: usize,
    stats: Arc<BrokerStats>,
    cancel: CancellationToken,
}

impl Broker {
    /// Spawns the dispatch loop and returns a handle to it.
    ///
    /// Must be called from within a tokio runtime. The returned task ends
    /// after [`shutdown`](Self::shutdown) or once every handle is dropped.
    pub fn start(config: &BrokerConfig) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(config.command_capacity.max(1));
        let stats = Arc::new(BrokerStats::new());
        let cancel = CancellationToken::new();

        let dispatcher = Dispatcher {
            subscribers: FxHashMap::default(),
            stats: Arc::clone(&stats),
            stall_warn_after: config.stall_warn_after(),
        };
        let task = tokio::spawn(dispatcher.run(rx, cancel.clone()));

        let broker = Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
            subscriber_capacity: config.subscriber_capacity.max(1),
            stats,
            cancel,
        };
        (broker, task)
    }

    /// Registers a new subscriber and returns its delivery endpoint.
    ///
    /// Returns as soon as the registration is queued. Every message published
    /// after this call returns is delivered to the new subscriber.
    pub async fn subscribe(&self) -> Result<Subscription, BrokerError> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        self.send(Command::Subscribe { id, tx }).await?;
        Ok(Subscription::new(id, rx))
    }

    /// Requests removal of a subscriber.
    ///
    /// Once processed, the subscriber's endpoint is closed and receives
    /// nothing further. Unsubscribing an id that is already gone is a no-op.
    pub async fn unsubscribe(&self, id: SubscriberId) -> Result<(), BrokerError> {
        self.send(Command::Unsubscribe(id)).await
    }

    /// Queues a message for broadcast.
    ///
    /// Returns once the message is queued, not once it is delivered.
    pub async fn publish(&self, message: Message) -> Result<(), BrokerError> {
        self.send(Command::Publish(message)).await
    }

    /// Returns a snapshot of broker statistics.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns `true` while the dispatch loop accepts commands.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Stops the dispatch loop and closes every subscriber endpoint.
    ///
    /// A broadcast in progress is abandoned.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn send(&self, command: Command) -> Result<(), BrokerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| BrokerError::Closed)
    }
}

impl MessageSink for Broker {
    async fn deliver(&self, message: Message) -> Result<(), SinkClosed> {
        self.publish(message).await.map_err(|_| SinkClosed)
    }
}

/// State owned by the dispatch loop.
struct Dispatcher {
    subscribers: FxHashMap<SubscriberId, mpsc::Sender<Message>>,
    stats: Arc<BrokerStats>,
    stall_warn_after: Duration,
}

impl Dispatcher {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, cancel: CancellationToken) {
        info!("Broker dispatch loop started");

        loop {
            let command = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            match command {
                Command::Subscribe { id, tx } => self.add(id, tx),
                Command::Unsubscribe(id) => self.remove(id),
                Command::Publish(message) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = self.broadcast(message) => {}
                    }
                }
            }
        }

        // Dropping the senders closes every remaining endpoint
        let remaining = self.subscribers.len();
        self.subscribers.clear();
        self.stats.clear_active();
        info!(remaining, "Broker dispatch loop stopped");
    }

    fn add(&mut self, id: SubscriberId, tx: mpsc::Sender<Message>) {
        self.subscribers.insert(id, tx);
        self.stats.record_subscribe();
        info!(subscriber = %id, active = self.subscribers.len(), "Subscriber added");
    }

    fn remove(&mut self, id: SubscriberId) {
        if self.subscribers.remove(&id).is_some() {
            self.stats.record_unsubscribe();
            info!(subscriber = %id, active = self.subscribers.len(), "Subscriber removed");
        } else {
            debug!(subscriber = %id, "Ignoring unsubscribe for unknown subscriber");
        }
    }

    async fn broadcast(&mut self, message: Message) {
        self.stats.record_publish();

        let mut gone = Vec::new();
        for (&id, tx) in &self.subscribers {
            if deliver(id, tx, message.clone(), self.stall_warn_after, &self.stats).await {
                self.stats.record_delivery();
            } else {
                gone.push(id);
            }
        }

        for id in gone {
            // The receiver is already dropped, so removing closes nothing twice
            self.subscribers.remove(&id);
            self.stats.record_unsubscribe();
            debug!(subscriber = %id, "Removed subscriber whose receiver was dropped");
        }

        debug!(
            subscribers = self.subscribers.len(),
            offset = message.offset(),
            "Broadcasted message to subscribers"
        );
    }
}

/// Delivers one message into one subscriber channel.
///
/// Returns `false` if the receiver has been dropped.
async fn deliver(
    id: SubscriberId,
    tx: &mpsc::Sender<Message>,
    message: Message,
    stall_warn_after: Duration,
    stats: &BrokerStats,
) -> bool {
    let permit = match tokio::time::timeout(stall_warn_after, tx.reserve()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => return false,
        Err(_) => {
            stats.record_stall();
            warn!(
                subscriber = %id,
                waited_ms = u64::try_from(stall_warn_after.as_millis()).unwrap_or(u64::MAX),
                "Delivery stalled: subscriber is not reading, broadcast is blocked"
            );
            match tx.reserve().await {
                Ok(permit) => {
                    info!(subscriber = %id, "Stalled delivery resumed");
                    permit
                }
                Err(_) => return false,
            }
        }
    };
    permit.send(message);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    async fn recv(subscription: &mut Subscription) -> Option<Message> {
        tokio::time::timeout(RECV_TIMEOUT, subscription.recv())
            .await
            .expect("Timed out waiting for message")
    }

    async fn wait_for(broker: &Broker, condition: impl Fn(&StatsSnapshot) -> bool) {
        tokio::time::timeout(RECV_TIMEOUT, async {
            while !condition(&broker.stats()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Timed out waiting for broker stats");
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let (broker, _task) = Broker::start(&BrokerConfig::default());
        let mut sub = broker.subscribe().await.expect("subscribe");

        broker.publish(Message::new(0, "hello")).await.expect("publish");

        let message = recv(&mut sub).await.expect("message");
        assert_eq!(message.line(), "hello");
        assert_eq!(broker.stats().deliveries, 1);
    }

    #[tokio::test]
    async fn test_fan_out_to_every_subscriber() {
        let (broker, _task) = Broker::start(&BrokerConfig::default());
        let mut subs = Vec::new();
        for _ in 0..5 {
            subs.push(broker.subscribe().await.expect("subscribe"));
        }

        let published = Message::new(12, "fan out");
        broker.publish(published.clone()).await.expect("publish");

        for sub in &mut subs {
            assert_eq!(recv(sub).await, Some(published.clone()));
        }
        wait_for(&broker, |s| s.deliveries == 5).await;
        assert_eq!(broker.stats().published, 1);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_messages() {
        let (broker, _task) = Broker::start(&BrokerConfig::default());
        let mut early = broker.subscribe().await.expect("subscribe");

        broker.publish(Message::new(0, "first")).await.expect("publish");
        let mut late = broker.subscribe().await.expect("subscribe");
        broker.publish(Message::new(6, "second")).await.expect("publish");

        assert_eq!(recv(&mut early).await.map(|m| m.offset()), Some(0));
        assert_eq!(recv(&mut early).await.map(|m| m.offset()), Some(6));
        assert_eq!(recv(&mut late).await.map(|m| m.offset()), Some(6));
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_endpoint() {
        let (broker, _task) = Broker::start(&BrokerConfig::default());
        let mut leaving = broker.subscribe().await.expect("subscribe");
        let mut staying = broker.subscribe().await.expect("subscribe");

        broker.unsubscribe(leaving.id()).await.expect("unsubscribe");
        broker.publish(Message::new(0, "after")).await.expect("publish");

        assert!(recv(&mut leaving).await.is_none());
        assert_eq!(recv(&mut staying).await.map(|m| m.offset()), Some(0));
    }

    #[tokio::test]
    async fn test_double_unsubscribe_is_noop() {
        let (broker, _task) = Broker::start(&BrokerConfig::default());
        let mut sub = broker.subscribe().await.expect("subscribe");
        let id = sub.id();

        broker.unsubscribe(id).await.expect("unsubscribe");
        broker.unsubscribe(id).await.expect("second unsubscribe");
        broker.publish(Message::new(0, "ping")).await.expect("publish");
        wait_for(&broker, |s| s.published == 1).await;

        assert!(recv(&mut sub).await.is_none());
        let stats = broker.stats();
        assert_eq!(stats.unsubscribed, 1);
        assert_eq!(stats.active, 0);
        assert!(broker.is_running());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_removed_on_publish() {
        let (broker, _task) = Broker::start(&BrokerConfig::default());
        let sub = broker.subscribe().await.expect("subscribe");
        drop(sub);

        broker.publish(Message::new(0, "nobody")).await.expect("publish");
        wait_for(&broker, |s| s.active == 0 && s.published == 1).await;
        assert_eq!(broker.stats().deliveries, 0);
    }

    #[tokio::test]
    async fn test_stalled_subscriber_blocks_and_is_reported() {
        let config = BrokerConfig {
            command_capacity: 8,
            subscriber_capacity: 1,
            stall_warn_ms: 50,
        };
        let (broker, _task) = Broker::start(&config);
        let mut slow = broker.subscribe().await.expect("subscribe");
        let mut fast = broker.subscribe().await.expect("subscribe");

        // First message fills the slow subscriber's single slot
        broker.publish(Message::new(0, "one")).await.expect("publish");
        assert_eq!(recv(&mut fast).await.map(|m| m.offset()), Some(0));

        // Second message cannot be delivered to the slow subscriber
        broker.publish(Message::new(4, "two")).await.expect("publish");
        wait_for(&broker, StatsSnapshot::has_stalled).await;

        // Draining the slow subscriber unblocks the whole broadcast
        assert_eq!(recv(&mut slow).await.map(|m| m.offset()), Some(0));
        assert_eq!(recv(&mut slow).await.map(|m| m.offset()), Some(4));
        assert_eq!(recv(&mut fast).await.map(|m| m.offset()), Some(4));
        assert_eq!(broker.stats().stalls, 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let (broker, task) = Broker::start(&BrokerConfig::default());
        let mut sub = broker.subscribe().await.expect("subscribe");

        broker.shutdown();
        tokio::time::timeout(RECV_TIMEOUT, task)
            .await
            .expect("dispatch loop should stop")
            .expect("dispatch loop should not panic");

        assert!(recv(&mut sub).await.is_none());
        assert!(!broker.is_running());
        assert_eq!(
            broker.publish(Message::new(0, "late")).await,
            Err(BrokerError::Closed)
        );
        assert!(broker.subscribe().await.is_err());
    }

    #[tokio::test]
    async fn test_broker_as_message_sink() {
        let (broker, _task) = Broker::start(&BrokerConfig::default());
        let mut sub = broker.subscribe().await.expect("subscribe");

        broker
            .deliver(Message::new(3, "via sink"))
            .await
            .expect("deliver");
        assert_eq!(recv(&mut sub).await.map(|m| m.offset()), Some(3));
    }
}
