//! Configuration structures for tailcast.
//!
//! This module provides configuration types for all components of the service:
//!
//! - [`WatchConfig`] - File watcher settings (poll interval)
//! - [`BrokerConfig`] - Broker channel capacities and stall detection
//! - [`ServerConfig`] - HTTP listen address
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] and deserialize with
//! `#[serde(default)]`, so a config file only needs the fields it overrides.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the file watcher.
///
/// # Examples
///
/// ```
/// use tc_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert_eq!(config.poll_interval_ms, 1000);
/// assert_eq!(config.max_lines_per_poll, 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// How often the watched file is re-stat'ed for growth, in milliseconds.
    pub poll_interval_ms: u64,

    /// Upper bound on lines read by a single poll.
    ///
    /// A larger backlog is drained over consecutive polls without waiting
    /// for the next tick.
    pub max_lines_per_poll: usize,
}

impl WatchConfig {
    /// Returns the poll interval as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_lines_per_poll: 4096,
        }
    }
}

/// Configuration for the fan-out broker.
///
/// Delivery into a subscriber channel is awaited without a timeout; a
/// subscriber that stops reading stalls the dispatch loop. `stall_warn_ms`
/// only controls when such a stall is reported.
///
/// # Examples
///
/// ```
/// use tc_core::BrokerConfig;
///
/// let config = BrokerConfig::default();
/// assert_eq!(config.command_capacity, 64);
/// assert_eq!(config.subscriber_capacity, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Capacity of the command queue feeding the dispatch loop.
    pub command_capacity: usize,

    /// Capacity of each subscriber's delivery channel.
    pub subscriber_capacity: usize,

    /// A single delivery taking longer than this is reported as a stall.
    pub stall_warn_ms: u64,
}

impl BrokerConfig {
    /// Returns the stall reporting threshold as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn stall_warn_after(&self) -> Duration {
        Duration::from_millis(self.stall_warn_ms)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            command_capacity: 64,
            subscriber_capacity: 16,
            stall_warn_ms: 5000,
        }
    }
}

/// Configuration for the HTTP server.
///
/// # Examples
///
/// ```
/// use tc_core::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.socket_addr().port(), 8000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind: IpAddr,

    /// Port to listen on.
    pub port: u16,
}

impl ServerConfig {
    /// Returns the full listen address.
    #[inline]
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
        }
    }
}

/// Root configuration for tailcast.
///
/// # Examples
///
/// ```
/// use tc_core::Config;
///
/// let config = Config::default();
/// assert_eq!(config.file.as_str(), "access.log");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The file whose appended lines are streamed.
    pub file: Utf8PathBuf,

    /// File watcher configuration.
    pub watch: WatchConfig,

    /// Broker configuration.
    pub broker: BrokerConfig,

    /// HTTP server configuration.
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file: Utf8PathBuf::from("access.log"),
            watch: WatchConfig::default(),
            broker: BrokerConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Loads a configuration from a JSON file.
    ///
    /// Fields missing from the file keep their default values. The result is
    /// validated before it is returned.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every option holds a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file.as_str().is_empty() {
            return Err(ConfigError::invalid_option("file", "must not be empty"));
        }
        if self.watch.poll_interval_ms == 0 {
            return Err(ConfigError::invalid_option(
                "watch.poll_interval_ms",
                "must be positive",
            ));
        }
        if self.watch.max_lines_per_poll == 0 {
            return Err(ConfigError::invalid_option(
                "watch.max_lines_per_poll",
                "must be positive",
            ));
        }
        if self.broker.command_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "broker.command_capacity",
                "must be positive",
            ));
        }
        if self.broker.subscriber_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "broker.subscriber_capacity",
                "must be positive",
            ));
        }
        if self.broker.stall_warn_ms == 0 {
            return Err(ConfigError::invalid_option(
                "broker.stall_warn_ms",
                "must be positive",
            ));
        }
        Ok(())
    }
}
