//! Polling file watcher with async message delivery.
//!
//! This module provides the [`FileWatcher`] type, which owns a
//! [`WatchState`] and drives it from a tokio task on a fixed interval.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                        │
//! │  ┌──────────────────┐    ┌────────────────┐    ┌────────────┐   │
//! │  │ interval tick    │ -> │ WatchState     │ -> │ MessageSink│   │
//! │  │ (poll_interval)  │    │ ::poll()       │    │ ::deliver  │   │
//! │  └──────────────────┘    └───────┬────────┘    └────────────┘   │
//! └──────────────────────────────────│──────────────────────────────┘
//!                                    │ spawn_blocking (stat + read)
//!                                    ▼
//!                             file on disk
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use camino::Utf8Path;
//! use tc_core::WatchConfig;
//! use tc_watcher::FileWatcher;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut watcher = FileWatcher::new(Utf8Path::new("access.log"), &WatchConfig::default())?;
//!
//!     let (tx, mut rx) = mpsc::channel(64);
//!     watcher.subscribe(tx)?;
//!
//!     while let Some(message) = rx.recv().await {
//!         print!("{}", message.payload());
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tc_core::{MessageSink, WatchConfig};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::WatchError;
use crate::events::LineBatch;
use crate::state::WatchState;

/// A watcher that streams newly appended lines of one file into a sink.
///
/// # Lifecycle
///
/// 1. **Creation**: [`FileWatcher::new()`] stats the file and records its
///    current size as the read cursor. Nothing is read yet.
///
/// 2. **Subscription**: [`FileWatcher::subscribe()`] spawns the poll task,
///    which hands every complete line appended from now on to the sink.
///
/// 3. **Shutdown**: Call [`FileWatcher::shutdown()`] to stop the task and
///    collect its result, or simply drop the watcher.
///
/// # Error Handling
///
/// Recoverable poll errors (see [`WatchError::is_recoverable`]) are logged
/// and retried on the next tick. Fatal ones end the poll task; the error is
/// returned by [`FileWatcher::shutdown()`]. Neither affects anything outside
/// this watcher.
pub struct FileWatcher {
    /// Baseline captured at creation; moved into the poll task on subscribe.
    state: Option<WatchState>,

    /// Time between polls.
    poll_interval: Duration,

    /// Cursor as of the last completed poll.
    cursor: Arc<AtomicU64>,

    /// Shutdown signal sender.
    ///
    /// Set to `None` after shutdown is initiated.
    shutdown_tx: Option<oneshot::Sender<()>>,

    /// Handle to the poll task.
    task_handle: Option<JoinHandle<Result<(), WatchError>>>,

    /// The path being watched.
    path: Utf8PathBuf,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("path", &self.path)
            .field("cursor", &self.cursor())
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Creates a watcher for the file at `path`.
    ///
    /// Content already in the file is never emitted: the read cursor starts
    /// at the current end of the file.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if the path doesn't exist,
    /// [`WatchError::NotAFile`] if it is a directory or other non-file,
    /// [`WatchError::Io`] if it cannot be stat'ed, and
    /// [`WatchError::InvalidOption`] if the poll interval or line limit is
    /// zero.
    pub fn new(path: &Utf8Path, config: &WatchConfig) -> Result<Self, WatchError> {
        if config.poll_interval_ms == 0 {
            return Err(WatchError::InvalidOption {
                option: "poll_interval_ms",
                reason: "must be positive",
            });
        }
        if config.max_lines_per_poll == 0 {
            return Err(WatchError::InvalidOption {
                option: "max_lines_per_poll",
                reason: "must be positive",
            });
        }

        let state = WatchState::open(path)?.with_line_limit(config.max_lines_per_poll);
        let cursor = Arc::new(AtomicU64::new(state.cursor()));

        debug!(path = %path, cursor = state.cursor(), "Created file watcher");

        Ok(Self {
            state: Some(state),
            poll_interval: config.poll_interval(),
            cursor,
            shutdown_tx: None,
            task_handle: None,
            path: path.to_owned(),
        })
    }

    /// Starts polling and delivering messages to `sink`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::AlreadySubscribed`] if the poll task was already
    /// started.
    pub fn subscribe<S: MessageSink>(&mut self, sink: S) -> Result<(), WatchError> {
        let Some(state) = self.state.take() else {
            return Err(WatchError::AlreadySubscribed(self.path.clone()));
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task_handle = tokio::spawn(run_poll_loop(
            state,
            self.poll_interval,
            sink,
            shutdown_rx,
            Arc::clone(&self.cursor),
        ));

        self.shutdown_tx = Some(shutdown_tx);
        self.task_handle = Some(task_handle);
        Ok(())
    }

    /// Returns the path being watched.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the read cursor as of the last completed poll.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Returns `true` if the poll task is running.
    ///
    /// The task stops when shut down, when the sink closes, or on a fatal
    /// poll error.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some() && self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the poll task and returns how it ended.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the task, if any, or
    /// [`WatchError::Join`] if the task panicked.
    pub async fn shutdown(mut self) -> Result<(), WatchError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // Ignore error if the task already ended
            let _ = tx.send(());
        }

        if let Some(handle) = self.task_handle.take() {
            handle.await??;
        }

        Ok(())
    }

    /// Waits for the poll task to end on its own and returns how it ended.
    ///
    /// Resolves immediately with `Ok(())` if the watcher was never subscribed.
    ///
    /// # Errors
    ///
    /// Same as [`FileWatcher::shutdown()`].
    pub async fn stopped(&mut self) -> Result<(), WatchError> {
        match self.task_handle.as_mut() {
            Some(handle) => {
                let result = handle.await;
                self.task_handle = None;
                self.shutdown_tx = None;
                result?
            }
            None => Ok(()),
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Polls `state` every `poll_interval` until shut down or a fatal error.
async fn run_poll_loop<S: MessageSink>(
    mut state: WatchState,
    poll_interval: Duration,
    sink: S,
    mut shutdown_rx: oneshot::Receiver<()>,
    cursor: Arc<AtomicU64>,
) -> Result<(), WatchError> {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    info!(path = %state.path(), cursor = state.cursor(), "File watcher started");

    let mut failed = false;
    loop {
        // A backlog left by the line limit is read without waiting for a tick
        let backlog = state.has_backlog() && !failed;
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                info!(path = %state.path(), "File watcher stopped");
                return Ok(());
            }
            _ = ticker.tick(), if !backlog => {}
            () = tokio::task::yield_now(), if backlog => {}
        }

        let (returned, result) = tokio::task::spawn_blocking(move || {
            let result = state.poll();
            (state, result)
        })
        .await?;
        state = returned;
        cursor.store(state.cursor(), Ordering::Relaxed);

        failed = result.is_err();
        match result {
            Ok(batch) if batch.is_empty() => {}
            Ok(batch) => {
                debug!(
                    path = %state.path(),
                    lines = batch.len(),
                    cursor = state.cursor(),
                    backlog = state.has_backlog(),
                    "File modified"
                );
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!(path = %state.path(), "File watcher stopped during delivery");
                        return Ok(());
                    }
                    delivered = deliver_batch(&sink, batch) => delivered?,
                }
            }
            Err(e) if e.is_recoverable() => {
                warn!(path = %state.path(), error = %e, "Poll failed, retrying on next tick");
            }
            Err(e) => {
                error!(path = %state.path(), error = %e, "Poll failed, stopping watcher");
                return Err(e);
            }
        }
    }
}

/// Hands every message of `batch` to `sink`, in order.
async fn deliver_batch<S: MessageSink>(sink: &S, batch: LineBatch) -> Result<(), WatchError> {
    for message in batch {
        if sink.deliver(message).await.is_err() {
            debug!("Message sink closed, stopping watcher");
            return Err(WatchError::ChannelClosed);
        }
    }
    Ok(())
}
