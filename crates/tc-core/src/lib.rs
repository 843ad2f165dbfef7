//! Core types, configuration, and errors for tailcast.
//!
//! This crate provides the foundational types shared across the workspace:
//!
//! - [`Message`]: one appended line of the watched file, with its byte offset
//! - [`MessageSink`]: the seam between the file watcher and whatever
//!   consumes its messages (the broker, or a plain channel in tests)
//! - Configuration structures ([`Config`], [`WatchConfig`], [`BrokerConfig`],
//!   [`ServerConfig`])
//! - [`ConfigError`] for configuration loading and validation
//!
//! # Crate Dependencies
//!
//! ```text
//! tc-cli ──► tc-server ──► tc-broker ──► tc-core
//!        └─► tc-watcher ───────────────►
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod message;

pub use config::{BrokerConfig, Config, ServerConfig, WatchConfig};
pub use error::ConfigError;
pub use message::{Message, MessageSink, SinkClosed};
