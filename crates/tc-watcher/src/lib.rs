//! Polling file tail watcher with async message delivery.
//!
//! This crate detects append-only growth of a single file and turns every
//! newly written complete line into a [`Message`](tc_core::Message), handed
//! in file order to a [`MessageSink`](tc_core::MessageSink).
//!
//! # Overview
//!
//! The tc-watcher crate is designed to:
//!
//! - Start from the current end of the file, so existing content is never replayed
//! - Re-stat the file on a fixed interval (1 second by default)
//! - Read only the bytes between the read cursor and the observed end of file
//! - Hold back a trailing line until its `\n` arrives
//! - Keep transient I/O failures local to the watcher and retry them
//!
//! # Architecture
//!
//! ```text
//! FileWatcher (lifecycle, shutdown)
//!     │
//!     └── poll task (tokio interval)
//!             │
//!             ├── WatchState::poll  (spawn_blocking: stat, seek, read_until)
//!             │       │
//!             │       └── LineBatch (complete lines, file order)
//!             │
//!             └── MessageSink::deliver (one message at a time)
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
//! # async fn example() -> Result<(), tc_watcher::WatchError> {
//! let mut watcher = FileWatcher::new(Utf8Path::new("access.log"), &WatchConfig::default())?;
//! let (tx, mut rx) = mpsc::channel(64);
//! watcher.subscribe(tx)?;
//!
//! while let Some(message) = rx.recv().await {
//!     println!("{} @ {}", message.line(), message.offset());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Known Limitations
//!
//! - A file that shrinks (truncation, or rotation to a smaller file) stops the
//!   watcher with [`WatchError::CursorBeyondEof`]. Rotation to a file that is
//!   already larger than the cursor is not detected.
//! - Only one file per watcher.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod state;
pub mod watcher;

// Re-export error types
pub use error::WatchError;

// Re-export event types
pub use events::LineBatch;

// Re-export watcher types
pub use state::WatchState;
pub use watcher::FileWatcher;
