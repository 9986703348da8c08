use std::time::{Duration, Instant};

use realtime_link_core::LinkEvent;

use crate::error::ConnectionError;
use crate::transport::CloseReason;

/// Why the connection left the connected (or connecting) state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` or `dispose()` was called, or the transport was closed locally.
    Manual,
    /// No subscriber was left for the idle-teardown delay.
    IdleTeardown,
    /// The server closed the connection.
    Remote,
    /// The connection broke.
    Transport(String),
    /// Nothing was heard from the server for too long.
    HeartbeatTimeout,
}

impl From<CloseReason> for DisconnectReason {
    fn from(reason: CloseReason) -> Self {
        match reason {
            CloseReason::ClientInitiated => DisconnectReason::Manual,
            CloseReason::ServerInitiated => DisconnectReason::Remote,
            CloseReason::Transport(detail) => DisconnectReason::Transport(detail),
        }
    }
}

impl DisconnectReason {
    /// Short snake_case name, used as the `reason` metric label.
    pub fn label(&self) -> &'static str {
        match self {
            DisconnectReason::Manual => "manual",
            DisconnectReason::IdleTeardown => "idle_teardown",
            DisconnectReason::Remote => "remote",
            DisconnectReason::Transport(_) => "transport",
            DisconnectReason::HeartbeatTimeout => "heartbeat_timeout",
        }
    }
}

/// Lifecycle events emitted by a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A transport is being opened.
    Connecting {
        link_name: String,
        timestamp: Instant,
        attempt: u32,
    },
    /// The transport opened.
    Connected {
        link_name: String,
        timestamp: Instant,
    },
    /// The connection went away.
    Disconnected {
        link_name: String,
        timestamp: Instant,
        reason: DisconnectReason,
    },
    /// An attempt failed before or after opening.
    ConnectFailed {
        link_name: String,
        timestamp: Instant,
        error: ConnectionError,
    },
    /// An automatic reconnect was scheduled.
    ReconnectScheduled {
        link_name: String,
        timestamp: Instant,
        attempt: u32,
        delay: Duration,
    },
    /// Automatic reconnection gave up.
    ReconnectExhausted {
        link_name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// A liveness probe was sent.
    HeartbeatProbe {
        link_name: String,
        timestamp: Instant,
        idle: Duration,
    },
    /// The transport was force-closed for silence.
    StaleConnection {
        link_name: String,
        timestamp: Instant,
        idle: Duration,
    },
    /// The idle-teardown timer released the connection.
    IdleTeardown {
        link_name: String,
        timestamp: Instant,
    },
}

impl ConnectionEvent {
    pub(crate) fn connecting(name: &str, attempt: u32) -> Self {
        ConnectionEvent::Connecting {
            link_name: name.to_string(),
            timestamp: Instant::now(),
            attempt,
        }
    }

    pub(crate) fn connected(name: &str) -> Self {
        ConnectionEvent::Connected {
            link_name: name.to_string(),
            timestamp: Instant::now(),
        }
    }

    pub(crate) fn disconnected(name: &str, reason: DisconnectReason) -> Self {
        ConnectionEvent::Disconnected {
            link_name: name.to_string(),
            timestamp: Instant::now(),
            reason,
        }
    }

    pub(crate) fn connect_failed(name: &str, error: ConnectionError) -> Self {
        ConnectionEvent::ConnectFailed {
            link_name: name.to_string(),
            timestamp: Instant::now(),
            error,
        }
    }

    pub(crate) fn reconnect_scheduled(name: &str, attempt: u32, delay: Duration) -> Self {
        ConnectionEvent::ReconnectScheduled {
            link_name: name.to_string(),
            timestamp: Instant::now(),
            attempt,
            delay,
        }
    }

    pub(crate) fn reconnect_exhausted(name: &str, attempts: u32) -> Self {
        ConnectionEvent::ReconnectExhausted {
            link_name: name.to_string(),
            timestamp: Instant::now(),
            attempts,
        }
    }

    pub(crate) fn heartbeat_probe(name: &str, idle: Duration) -> Self {
        ConnectionEvent::HeartbeatProbe {
            link_name: name.to_string(),
            timestamp: Instant::now(),
            idle,
        }
    }

    pub(crate) fn stale_connection(name: &str, idle: Duration) -> Self {
        ConnectionEvent::StaleConnection {
            link_name: name.to_string(),
            timestamp: Instant::now(),
            idle,
        }
    }

    pub(crate) fn idle_teardown(name: &str) -> Self {
        ConnectionEvent::IdleTeardown {
            link_name: name.to_string(),
            timestamp: Instant::now(),
        }
    }
}

impl LinkEvent for ConnectionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ConnectionEvent::Connecting { .. } => "connecting",
            ConnectionEvent::Connected { .. } => "connected",
            ConnectionEvent::Disconnected { .. } => "disconnected",
            ConnectionEvent::ConnectFailed { .. } => "connect_failed",
            ConnectionEvent::ReconnectScheduled { .. } => "reconnect_scheduled",
            ConnectionEvent::ReconnectExhausted { .. } => "reconnect_exhausted",
            ConnectionEvent::HeartbeatProbe { .. } => "heartbeat_probe",
            ConnectionEvent::StaleConnection { .. } => "stale_connection",
            ConnectionEvent::IdleTeardown { .. } => "idle_teardown",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ConnectionEvent::Connecting { timestamp, .. }
            | ConnectionEvent::Connected { timestamp, .. }
            | ConnectionEvent::Disconnected { timestamp, .. }
            | ConnectionEvent::ConnectFailed { timestamp, .. }
            | ConnectionEvent::ReconnectScheduled { timestamp, .. }
            | ConnectionEvent::ReconnectExhausted { timestamp, .. }
            | ConnectionEvent::HeartbeatProbe { timestamp, .. }
            | ConnectionEvent::StaleConnection { timestamp, .. }
            | ConnectionEvent::IdleTeardown { timestamp, .. } => *timestamp,
        }
    }

    fn link_name(&self) -> &str {
        match self {
            ConnectionEvent::Connecting { link_name, .. }
            | ConnectionEvent::Connected { link_name, .. }
            | ConnectionEvent::Disconnected { link_name, .. }
            | ConnectionEvent::ConnectFailed { link_name, .. }
            | ConnectionEvent::ReconnectScheduled { link_name, .. }
            | ConnectionEvent::ReconnectExhausted { link_name, .. }
            | ConnectionEvent::HeartbeatProbe { link_name, .. }
            | ConnectionEvent::StaleConnection { link_name, .. }
            | ConnectionEvent::IdleTeardown { link_name, .. } => link_name,
        }
    }
}
