//! Transport capability traits.
//!
//! The manager does not speak any wire protocol itself. A [`Connector`]
//! opens one physical connection per attempt and returns a [`Transport`]
//! handle for outbound traffic; progress and inbound traffic flow back
//! through the [`TransportEvents`] sink handed to `open`.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Parameters for opening a transport.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Server URL.
    pub url: String,
    /// Credential to present, if any.
    pub auth_token: Option<String>,
    /// Automatic reconnects already made; 0 for a fresh connect.
    pub attempt: u32,
}

impl std::fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// An open (or opening) duplex channel.
///
/// `send` runs with the manager's internal lock held; neither method may
/// block or call back into the manager.
pub trait Transport: Send + Sync {
    /// Queues an outbound message.
    fn send(&self, event: &str, payload: &Value) -> Result<(), TransportError>;

    /// Closes the channel. Events reported afterwards are ignored.
    fn close(&self);
}

/// Opens transports.
pub trait Connector: Send + Sync + 'static {
    /// Starts opening a transport.
    ///
    /// Must return immediately; the outcome is reported later through
    /// `events` as [`TransportEvent::Open`] or [`TransportEvent::Error`].
    /// Called without the manager's lock held, so reading
    /// [`ConnectionManager::state`](crate::ConnectionManager::state) from
    /// here is fine. If the attempt is abandoned before `open` returns, the
    /// transport is closed straight away.
    fn open(&self, request: ConnectRequest, events: TransportEvents) -> Box<dyn Transport>;
}

impl<F> Connector for F
where
    F: Fn(ConnectRequest, TransportEvents) -> Box<dyn Transport> + Send + Sync + 'static,
{
    fn open(&self, request: ConnectRequest, events: TransportEvents) -> Box<dyn Transport> {
        self(request, events)
    }
}

/// Why a transport closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed locally; never triggers a reconnect.
    ClientInitiated,
    /// The server closed the connection.
    ServerInitiated,
    /// The connection broke.
    Transport(String),
}

impl CloseReason {
    /// Returns true for a manual/local close.
    pub fn is_client_initiated(&self) -> bool {
        matches!(self, CloseReason::ClientInitiated)
    }
}

/// Something a transport observed.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The handshake completed.
    Open,
    /// The channel closed.
    Close(CloseReason),
    /// The channel failed.
    Error(TransportError),
    /// A named inbound message.
    Message {
        /// Message name.
        event: String,
        /// Message body.
        payload: Value,
    },
}

/// Sink a transport reports its events into.
///
/// Every method returns `false` once the manager has stopped listening to
/// this transport (it was closed or superseded).
#[derive(Debug, Clone)]
pub struct TransportEvents {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportEvents {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Reports a completed handshake.
    pub fn open(&self) -> bool {
        self.report(TransportEvent::Open)
    }

    /// Reports a closed channel.
    pub fn close(&self, reason: CloseReason) -> bool {
        self.report(TransportEvent::Close(reason))
    }

    /// Reports a failure.
    pub fn error(&self, error: TransportError) -> bool {
        self.report(TransportEvent::Error(error))
    }

    /// Reports an inbound message.
    pub fn message(&self, event: impl Into<String>, payload: Value) -> bool {
        self.report(TransportEvent::Message {
            event: event.into(),
            payload,
        })
    }

    /// Reports any event.
    pub fn report(&self, event: TransportEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Returns true once the manager stopped listening.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
