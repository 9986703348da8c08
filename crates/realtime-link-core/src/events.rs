//! Lifecycle events.
//!
//! A connection manager narrates what it does (connecting, reconnect
//! scheduled, heartbeat probe, ...) as [`LinkEvent`]s handed to every
//! observer in an [`EventListeners`] list. Observers are fixed when the
//! manager is configured; there is no unsubscribe.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::listeners::call_isolated;

/// Something a connection manager reports about itself.
pub trait LinkEvent: Send + Sync + fmt::Debug {
    /// Short snake_case kind, e.g. `"connected"` or `"reconnect_scheduled"`.
    fn event_type(&self) -> &'static str;

    /// When the manager produced the event.
    fn timestamp(&self) -> Instant;

    /// Name of the manager that produced the event.
    fn link_name(&self) -> &str;
}

/// Observes lifecycle events.
///
/// Closures get this through [`FnListener`].
pub trait EventListener<E: LinkEvent>: Send + Sync {
    /// Called once per event, on whichever thread produced it.
    fn on_event(&self, event: &E);
}

/// Observers of one manager, called in the order they were added.
pub struct EventListeners<E: LinkEvent> {
    observers: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: LinkEvent> EventListeners<E> {
    /// An empty list.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Appends an observer.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.observers.push(Arc::new(listener));
    }

    /// Hands `event` to every observer.
    ///
    /// An observer that panics is skipped; the rest still run. Returns how
    /// many panicked.
    pub fn emit(&self, event: &E) -> usize {
        #[cfg(feature = "tracing")]
        tracing::trace!(
            link = event.link_name(),
            event = event.event_type(),
            observers = self.observers.len(),
            "lifecycle event"
        );

        self.observers
            .iter()
            .filter(|observer| !call_isolated(|| observer.on_event(event)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }
}

impl<E: LinkEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            observers: self.observers.clone(),
        }
    }
}

impl<E: LinkEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: LinkEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventListeners({})", self.observers.len())
    }
}

/// Adapts a closure to [`EventListener`].
pub struct FnListener<F>(F);

impl<F> FnListener<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<E, F> EventListener<E> for FnListener<F>
where
    E: LinkEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.0)(event)
    }
}
