//! Core infrastructure for realtime-link.
//!
//! This crate holds the pieces that know nothing about sockets:
//! - [`events`]: lifecycle events and the listeners that observe them
//! - [`listeners`]: ordered listener sets with snapshot dispatch and panic isolation
//!
//! Both are used by `realtime-link` to fan connection state and inbound
//! messages out to many unrelated consumers without letting one of them
//! break delivery to the rest.

pub mod events;
pub mod listeners;

pub use events::{EventListener, EventListeners, FnListener, LinkEvent};
pub use listeners::{call_isolated, Listener, ListenerId, ListenerSet, Snapshot};
