//! In-memory transport for tests and local development.
//!
//! [`MockConnector`] records every transport the manager opens. Each one is
//! driven from the test through its [`MockTransportHandle`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::error::TransportError;
use crate::transport::{CloseReason, ConnectRequest, Connector, Transport, TransportEvents};

#[derive(Debug, Default)]
struct ConnectorInner {
    handles: Vec<MockTransportHandle>,
    auto_open: bool,
}

/// A [`Connector`] that opens in-memory transports.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    inner: Arc<Mutex<ConnectorInner>>,
}

impl MockConnector {
    /// Transports stay opening until [`MockTransportHandle::open`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transports report `Open` as soon as they are created.
    pub fn auto_open(self) -> Self {
        lock(&self.inner).auto_open = true;
        self
    }

    /// Number of transports opened so far.
    pub fn opened(&self) -> usize {
        lock(&self.inner).handles.len()
    }

    /// The `index`-th transport opened.
    pub fn handle(&self, index: usize) -> Option<MockTransportHandle> {
        lock(&self.inner).handles.get(index).cloned()
    }

    /// The most recent transport.
    pub fn last(&self) -> Option<MockTransportHandle> {
        lock(&self.inner).handles.last().cloned()
    }

    /// Every transport opened so far, oldest first.
    pub fn handles(&self) -> Vec<MockTransportHandle> {
        lock(&self.inner).handles.clone()
    }
}

impl Connector for MockConnector {
    fn open(&self, request: ConnectRequest, events: TransportEvents) -> Box<dyn Transport> {
        let wire = Arc::new(Mutex::new(Wire::default()));
        let handle = MockTransportHandle {
            request,
            events,
            wire: Arc::clone(&wire),
        };

        let auto_open = {
            let mut inner = lock(&self.inner);
            inner.handles.push(handle.clone());
            inner.auto_open
        };
        if auto_open {
            handle.open();
        }
        Box::new(MockTransport { wire })
    }
}

#[derive(Debug, Default)]
struct Wire {
    sent: Vec<(String, Value)>,
    closed: bool,
    fail_sends: bool,
}

struct MockTransport {
    wire: Arc<Mutex<Wire>>,
}

impl Transport for MockTransport {
    fn send(&self, event: &str, payload: &Value) -> Result<(), TransportError> {
        let mut wire = lock(&self.wire);
        if wire.closed {
            return Err(TransportError::Closed);
        }
        if wire.fail_sends {
            return Err(TransportError::Send(format!("refused {event}")));
        }
        wire.sent.push((event.to_string(), payload.clone()));
        Ok(())
    }

    fn close(&self) {
        lock(&self.wire).closed = true;
    }
}

/// Test-side view of one opened transport.
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    request: ConnectRequest,
    events: TransportEvents,
    wire: Arc<Mutex<Wire>>,
}

impl MockTransportHandle {
    /// The request the transport was opened with.
    pub fn request(&self) -> &ConnectRequest {
        &self.request
    }

    /// Completes the handshake.
    pub fn open(&self) -> bool {
        self.events.open()
    }

    /// Simulates the server (or the network) closing the connection.
    pub fn close_remote(&self, reason: CloseReason) -> bool {
        lock(&self.wire).closed = true;
        self.events.close(reason)
    }

    /// Reports a transport failure.
    pub fn error(&self, error: TransportError) -> bool {
        self.events.error(error)
    }

    /// Delivers an inbound message.
    pub fn message(&self, event: impl Into<String>, payload: Value) -> bool {
        self.events.message(event, payload)
    }

    /// Makes subsequent sends fail.
    pub fn fail_sends(&self, fail: bool) {
        lock(&self.wire).fail_sends = fail;
    }

    /// Messages sent through this transport.
    pub fn sent(&self) -> Vec<(String, Value)> {
        lock(&self.wire).sent.clone()
    }

    /// Names of the messages sent through this transport.
    pub fn sent_events(&self) -> Vec<String> {
        lock(&self.wire)
            .sent
            .iter()
            .map(|(event, _)| event.clone())
            .collect()
    }

    /// Returns true once the manager closed the transport.
    pub fn is_closed(&self) -> bool {
        lock(&self.wire).closed
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
