//! Error types for the tc-server crate.

use std::net::SocketAddr;

use axum::http::{StatusCode, Version};
use axum::response::{IntoResponse, Response};
use tc_broker::BrokerError;

/// Errors that reject a streaming request before it is registered.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The connection cannot carry an incrementally flushed response.
    ///
    /// HTTP/1.0 and older have no chunked transfer encoding, so every frame
    /// would sit in a buffer until the connection closed.
    #[error("Streaming unsupported!")]
    TransportUnsupported {
        /// The HTTP version of the rejected request.
        version: Version,
    },

    /// The broker is no longer accepting subscribers.
    #[error("broker unavailable: {0}")]
    Broker(#[from] BrokerError),
}

impl StreamError {
    /// Returns the HTTP status used when this error is sent to the client.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::TransportUnsupported { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Broker(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Errors that stop the HTTP server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that was requested.
        addr: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The server failed while accepting or serving connections.
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_unsupported_is_server_error() {
        let err = StreamError::TransportUnsupported {
            version: Version::HTTP_10,
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Streaming unsupported!");
    }

    #[test]
    fn test_broker_closed_is_unavailable() {
        let err = StreamError::from(BrokerError::Closed);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("not running"));
    }

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:8000"));
    }
}
