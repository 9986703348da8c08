//! Connection state snapshots.

use std::time::SystemTime;

use crate::error::ConnectionError;

/// Coarse view of a [`ConnectionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    /// Neither connected nor trying to connect.
    Idle,
    /// A transport is being opened.
    Connecting,
    /// The transport is open.
    Connected,
}

/// An immutable snapshot of the connection.
///
/// The manager never mutates a snapshot in place: every transition builds a
/// new value and hands it to state listeners. `is_connected` and
/// `is_connecting` are never both true.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    is_connected: bool,
    is_connecting: bool,
    error: Option<ConnectionError>,
    reconnect_attempts: u32,
    last_connected: Option<SystemTime>,
}

impl ConnectionState {
    /// The state of a manager that has never connected.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Returns true while the transport is open.
    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    /// Returns true while a transport is being opened.
    pub fn is_connecting(&self) -> bool {
        self.is_connecting
    }

    /// The last recorded error, if any.
    pub fn error(&self) -> Option<&ConnectionError> {
        self.error.as_ref()
    }

    /// Automatic reconnects made since the last successful connect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// When the transport last opened.
    pub fn last_connected(&self) -> Option<SystemTime> {
        self.last_connected
    }

    /// Returns the coarse phase.
    pub fn phase(&self) -> ConnectionPhase {
        if self.is_connected {
            ConnectionPhase::Connected
        } else if self.is_connecting {
            ConnectionPhase::Connecting
        } else {
            ConnectionPhase::Idle
        }
    }

    pub(crate) fn connecting(&self) -> Self {
        Self {
            is_connected: false,
            is_connecting: true,
            error: None,
            ..self.clone()
        }
    }

    pub(crate) fn retrying(&self) -> Self {
        Self {
            reconnect_attempts: self.reconnect_attempts.saturating_add(1),
            ..self.connecting()
        }
    }

    pub(crate) fn connected(&self, at: SystemTime) -> Self {
        Self {
            is_connected: true,
            is_connecting: false,
            error: None,
            reconnect_attempts: 0,
            last_connected: Some(at),
        }
    }

    pub(crate) fn closed(&self) -> Self {
        Self {
            is_connected: false,
            is_connecting: false,
            ..self.clone()
        }
    }

    pub(crate) fn failed(&self, error: ConnectionError) -> Self {
        Self {
            error: Some(error),
            ..self.closed()
        }
    }

    pub(crate) fn with_error(&self, error: ConnectionError) -> Self {
        Self {
            error: Some(error),
            ..self.clone()
        }
    }

    pub(crate) fn reset(&self) -> Self {
        Self {
            error: None,
            reconnect_attempts: 0,
            ..self.clone()
        }
    }

    pub(crate) fn disconnected(&self) -> Self {
        Self {
            last_connected: self.last_connected,
            ..Self::idle()
        }
    }
}
