//! A resilient, multiplexed client connection to a realtime server.
//!
//! One [`ConnectionManager`] owns one long-lived duplex transport and shares
//! it between every feature of an application. It reconnects with capped
//! exponential backoff, probes and recycles connections that went silent,
//! and releases the transport once nobody is subscribed anymore.
//!
//! # Features
//!
//! - **Single-flight connect**: concurrent [`ConnectionManager::connect`]
//!   calls share one attempt and never open a second transport
//! - **Backoff**: `min(2s * 2^n, 30s)` by default, capped at two automatic
//!   attempts; authentication failures never reconnect
//! - **Heartbeat**: a probe after 60s of silence, a forced reconnect after 120s
//! - **Scoped subscriptions**: every subscription is a [`Subscription`]
//!   guard; the transport is torn down 60s after the last one is dropped
//! - **Isolated listeners**: a panicking listener never stops the others
//! - **Typed messages**: [`ServerEvent`] and [`ClientEvent`] on top of the
//!   string-keyed [`ConnectionManager::subscribe_event`] and
//!   [`ConnectionManager::emit`]
//!
//! # Transports
//!
//! The manager does not speak any wire protocol itself. A [`Connector`]
//! opens a [`Transport`] and reports what happens to it through
//! [`TransportEvents`]. The `mock` feature provides an in-memory pair for
//! tests.
//!
//! # Examples
//!
//! ```rust
//! use realtime_link::{ConnectionConfig, ConnectionEvent};
//! use std::time::Duration;
//!
//! let config = ConnectionConfig::builder()
//!     .name("chat")
//!     .url("wss://chat.example.test/socket")
//!     .auth_token("session-token")
//!     .reconnect_backoff(Duration::from_secs(2), Duration::from_secs(30))
//!     .max_reconnect_attempts(2)
//!     .on_event(|event: &ConnectionEvent| {
//!         if let ConnectionEvent::ReconnectExhausted { attempts, .. } = event {
//!             eprintln!("gave up after {attempts} attempts");
//!         }
//!     })
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.max_reconnect_attempts(), Some(2));
//! ```
//!
//! # Feature Flags
//!
//! - `tracing`: structured logs for lifecycle transitions and swallowed
//!   listener panics
//! - `metrics`: `realtime_link_*` counters and gauges
//! - `mock`: [`mock::MockConnector`]

mod backoff;
mod config;
mod error;
mod events;
mod heartbeat;
mod manager;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod policy;
mod registry;
mod state;
mod subscription;
mod timer;
mod transport;
mod typed;

pub use backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use error::{
    default_classifier, ConfigError, ConnectionError, ErrorClass, ErrorClassifier, TransportError,
};
pub use events::{ConnectionEvent, DisconnectReason};
pub use manager::{ConnectionManager, TimerStatus};
pub use policy::ReconnectPolicy;
pub use state::{ConnectionPhase, ConnectionState};
pub use subscription::{Lease, Subscription};
pub use transport::{
    CloseReason, ConnectRequest, Connector, Transport, TransportEvent, TransportEvents,
};
pub use typed::{ClientEvent, ServerEvent};

pub use realtime_link_core::{EventListener, FnListener, LinkEvent};
