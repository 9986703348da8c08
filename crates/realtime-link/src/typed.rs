//! Typed inbound and outbound messages.
//!
//! The string-keyed [`ConnectionManager::subscribe_event`] and
//! [`ConnectionManager::emit`] stay available for ad hoc messages; these
//! traits bind a message name to a payload type once.

use serde::de::DeserializeOwned;
use serde::Serialize;
#[cfg(feature = "tracing")]
use tracing::debug;

use crate::manager::ConnectionManager;
use crate::subscription::Subscription;

/// A message the server pushes.
///
/// ```
/// use realtime_link::ServerEvent;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct RoomUpdate {
///     room: String,
///     count: u32,
/// }
///
/// impl ServerEvent for RoomUpdate {
///     const NAME: &'static str = "room_update";
/// }
/// ```
pub trait ServerEvent: DeserializeOwned + Send + 'static {
    /// Wire name of the message.
    const NAME: &'static str;
}

/// A message the client sends.
pub trait ClientEvent: Serialize {
    /// Wire name of the message.
    const NAME: &'static str;
}

impl ConnectionManager {
    /// Registers a listener for `E`.
    ///
    /// Payloads that do not decode as `E` are skipped.
    pub fn subscribe<E, F>(&self, listener: F) -> Subscription
    where
        E: ServerEvent,
        F: Fn(E) + Send + Sync + 'static,
    {
        self.subscribe_event(E::NAME, move |payload| {
            match E::deserialize(payload) {
                Ok(event) => listener(event),
                Err(_error) => {
                    #[cfg(feature = "tracing")]
                    debug!(event = E::NAME, error = %_error, "dropping undecodable payload");
                }
            }
        })
    }

    /// Serializes and sends `event`. Returns `false` if not connected or if
    /// the payload does not serialize.
    pub fn send<E: ClientEvent>(&self, event: &E) -> bool {
        match serde_json::to_value(event) {
            Ok(payload) => self.emit(E::NAME, payload),
            Err(_error) => {
                #[cfg(feature = "tracing")]
                debug!(event = E::NAME, error = %_error, "payload does not serialize");
                false
            }
        }
    }
}
