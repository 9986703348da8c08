//! Error types.
//!
//! Transports report [`TransportError`]s. The manager classifies each one
//! ([`ErrorClass`]) and records the outcome in
//! [`ConnectionState::error`](crate::ConnectionState::error) as a
//! [`ConnectionError`]. Public operations never return these as `Err`.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server rejected the credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The network path failed.
    #[error("network error: {0}")]
    Network(String),

    /// The transport gave up on its own.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The transport is already closed.
    #[error("transport closed")]
    Closed,

    /// An outbound message could not be written.
    #[error("send failed: {0}")]
    Send(String),
}

/// How the manager treats a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Fatal for the current attempt; never reconnects automatically.
    Authentication,
    /// Subject to the reconnection policy.
    Retryable,
}

/// Decides the [`ErrorClass`] of a transport error.
pub type ErrorClassifier = Arc<dyn Fn(&TransportError) -> ErrorClass + Send + Sync>;

/// The classifier used when none is configured.
///
/// [`TransportError::Unauthorized`] and any error whose message mentions
/// "auth" or "forbidden" are authentication failures; everything else is
/// retryable.
pub fn default_classifier(error: &TransportError) -> ErrorClass {
    if matches!(error, TransportError::Unauthorized(_)) {
        return ErrorClass::Authentication;
    }
    let message = error.to_string().to_lowercase();
    if message.contains("auth") || message.contains("forbidden") {
        ErrorClass::Authentication
    } else {
        ErrorClass::Retryable
    }
}

/// The last error recorded on the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Credentials were rejected. Requires new credentials or an explicit
    /// `reset()` + `connect()`.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A retryable transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport did not open in time.
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// Automatic reconnection gave up.
    #[error("max attempts reached")]
    MaxAttemptsReached {
        /// Reconnects made before giving up.
        attempts: u32,
    },
}

impl ConnectionError {
    pub(crate) fn from_transport(error: &TransportError, class: ErrorClass) -> Self {
        match (class, error) {
            (ErrorClass::Authentication, TransportError::Unauthorized(reason)) => {
                ConnectionError::Authentication(reason.clone())
            }
            (ErrorClass::Authentication, other) => {
                ConnectionError::Authentication(other.to_string())
            }
            (ErrorClass::Retryable, TransportError::Timeout(after)) => {
                ConnectionError::Timeout(*after)
            }
            (ErrorClass::Retryable, other) => ConnectionError::Transport(other.to_string()),
        }
    }

    /// Returns true for authentication failures.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConnectionError::Authentication(_))
    }

    /// Returns true when no automatic reconnect will follow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionError::Authentication(_) | ConnectionError::MaxAttemptsReached { .. }
        )
    }

    /// Returns true for network and timeout failures.
    pub fn is_retryable(&self) -> bool {
        !self.is_terminal()
    }
}

/// Errors returned when building a [`ConnectionConfig`](crate::ConnectionConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No server URL was given.
    #[error("url must not be empty")]
    EmptyUrl,

    /// The heartbeat would spin.
    #[error("heartbeat interval must be greater than zero")]
    ZeroHeartbeatInterval,

    /// The force-close threshold must be reached after the probe threshold.
    #[error(
        "stale force-close threshold ({force_close:?}) must exceed the probe threshold ({probe:?})"
    )]
    InvalidStaleThresholds {
        /// Configured probe threshold.
        probe: Duration,
        /// Configured force-close threshold.
        force_close: Duration,
    },
}
