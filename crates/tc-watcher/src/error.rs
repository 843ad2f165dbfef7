//! Error types for the tc-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while creating a watcher or running its poll loop.

use camino::Utf8PathBuf;

/// Errors that can occur during file watching operations.
///
/// # Error Recovery Strategy
///
/// - **Path not found** ([`WatchError::PathNotFound`]): Fatal - the file must exist
/// - **Not a file** ([`WatchError::NotAFile`]): Fatal - directories cannot be tailed
/// - **Invalid option** ([`WatchError::InvalidOption`]): Fatal - rejected at creation
/// - **Cursor beyond EOF** ([`WatchError::CursorBeyondEof`]): Fatal - the file
///   shrank or was replaced; the watcher stops instead of guessing where to resume
/// - **Already subscribed** ([`WatchError::AlreadySubscribed`]): Fatal - caller bug
/// - **Channel closed** ([`WatchError::ChannelClosed`]): Fatal - nobody is listening
/// - **Task failed** ([`WatchError::Join`]): Fatal - the poll task panicked
/// - **I/O errors** ([`WatchError::Io`]): Recoverable during polling - retried
///   on the next tick
///
/// # Examples
///
/// ```
/// use tc_watcher::WatchError;
///
/// fn handle_error(err: &WatchError) {
///     if err.is_recoverable() {
///         eprintln!("Transient watcher error, retrying: {err}");
///     } else {
///         eprintln!("Watcher stopped: {err}");
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The specified path does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The specified path exists but is not a regular file.
    #[error("path is not a regular file: {0}")]
    NotAFile(Utf8PathBuf),

    /// A [`WatchConfig`](tc_core::WatchConfig) value cannot be used.
    #[error("invalid watcher option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: &'static str,
        /// Explanation of why the option is invalid.
        reason: &'static str,
    },

    /// The file is now shorter than the read cursor.
    ///
    /// Raised when the file was truncated or replaced by a smaller one. The
    /// already-consumed region no longer matches what is on disk, so there is
    /// no well-defined place to resume reading.
    #[error("read cursor {cursor} is beyond end of file {path} ({len} bytes)")]
    CursorBeyondEof {
        /// The watched file.
        path: Utf8PathBuf,
        /// The stored read cursor.
        cursor: u64,
        /// The file length observed by the failing poll.
        len: u64,
    },

    /// `subscribe` was called on a watcher whose poll loop is already running.
    #[error("watcher for {0} is already subscribed")]
    AlreadySubscribed(Utf8PathBuf),

    /// The message sink was closed.
    #[error("message sink closed unexpectedly")]
    ChannelClosed,

    /// The poll task panicked or was cancelled.
    #[error("watcher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// An I/O error occurred while stat'ing or reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::NotAFile`] error.
    #[inline]
    pub fn not_a_file(path: impl Into<Utf8PathBuf>) -> Self {
        Self::NotAFile(path.into())
    }

    /// Returns `true` if this error is recoverable (polling can continue).
    ///
    /// Only plain I/O errors are recoverable: a failed stat or read leaves the
    /// read cursor where it was, so the next tick retries the same region.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns `true` if this error is fatal (the watcher should stop).
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path)
            | Self::NotAFile(path)
            | Self::AlreadySubscribed(path)
            | Self::CursorBeyondEof { path, .. } => Some(path),
            Self::InvalidOption { .. } | Self::ChannelClosed | Self::Join(_) | Self::Io(_) => {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_watch_error_path_not_found() {
        let err = WatchError::path_not_found("logs/missing.log");
        assert!(!err.is_recoverable());
        assert!(err.is_fatal());
        assert_eq!(err.path().map(|p| p.as_str()), Some("logs/missing.log"));
        assert_eq!(err.to_string(), "path does not exist: logs/missing.log");
    }

    #[test]
    fn test_watch_error_not_a_file() {
        let err = WatchError::not_a_file("/var/log");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("not a regular file"));
    }

    #[test]
    fn test_watch_error_cursor_beyond_eof() {
        let err = WatchError::CursorBeyondEof {
            path: Utf8PathBuf::from("/var/log/app.log"),
            cursor: 120,
            len: 10,
        };
        assert!(err.is_fatal());
        assert_eq!(err.path().map(|p| p.as_str()), Some("/var/log/app.log"));
        let msg = err.to_string();
        assert!(msg.contains("120"));
        assert!(msg.contains("10 bytes"));
    }

    #[test]
    fn test_watch_error_invalid_option() {
        let err = WatchError::InvalidOption {
            option: "poll_interval_ms",
            reason: "must be positive",
        };
        assert!(err.is_fatal());
        assert!(err.path().is_none());
        assert_eq!(
            err.to_string(),
            "invalid watcher option 'poll_interval_ms': must be positive"
        );
    }

    #[test]
    fn test_watch_error_channel_closed() {
        let err = WatchError::ChannelClosed;
        assert!(err.is_fatal());
        assert!(err.path().is_none());
        assert!(err.to_string().contains("sink closed"));
    }

    #[test]
    fn test_watch_error_io_is_recoverable() {
        let err = WatchError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "access denied",
        ));
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
        assert!(err.path().is_none());
        assert!(err.to_string().contains("I/O error"));
    }
}
