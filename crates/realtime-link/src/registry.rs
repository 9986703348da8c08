//! Reference-counted listener storage.
//!
//! Holds the state listeners, the named-message listeners and the number of
//! outstanding leases. A single counter tracks listeners of both kinds so the
//! controller has one place to ask whether the connection is still wanted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use realtime_link_core::{Listener, ListenerId, ListenerSet, Snapshot};
use serde_json::Value;

use crate::state::ConnectionState;

/// Identifies one registered listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubscriptionKey {
    State(ListenerId),
    Event(String, ListenerId),
}

#[derive(Default)]
struct RegistryInner {
    state: ListenerSet<ConnectionState>,
    events: HashMap<String, ListenerSet<Value>>,
    listeners: usize,
    leases: usize,
}

#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    inner: Mutex<RegistryInner>,
}

impl SubscriptionRegistry {
    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add_state<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.listeners += 1;
        inner.state.insert(listener)
    }

    pub(crate) fn add_event<F>(&self, event: &str, listener: F) -> SubscriptionKey
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.listeners += 1;
        let id = inner
            .events
            .entry(event.to_string())
            .or_default()
            .insert(listener);
        SubscriptionKey::Event(event.to_string(), id)
    }

    /// Removes one listener.
    ///
    /// Returns the remaining listener count, or `None` if the key was
    /// already gone.
    pub(crate) fn remove(&self, key: &SubscriptionKey) -> Option<usize> {
        let mut inner = self.lock();
        let removed = match key {
            SubscriptionKey::State(id) => inner.state.remove(*id),
            SubscriptionKey::Event(event, id) => match inner.events.get_mut(event) {
                Some(set) => {
                    let removed = set.remove(*id);
                    if set.is_empty() {
                        inner.events.remove(event);
                    }
                    removed
                }
                None => false,
            },
        };
        if !removed {
            return None;
        }
        inner.listeners -= 1;
        Some(inner.listeners)
    }

    pub(crate) fn acquire_lease(&self) {
        self.lock().leases += 1;
    }

    /// Returns the remaining lease count.
    pub(crate) fn release_lease(&self) -> usize {
        let mut inner = self.lock();
        inner.leases = inner.leases.saturating_sub(1);
        inner.leases
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.lock().listeners
    }

    pub(crate) fn lease_count(&self) -> usize {
        self.lock().leases
    }

    /// Returns true when neither listeners nor leases remain.
    pub(crate) fn is_idle(&self) -> bool {
        let inner = self.lock();
        inner.listeners == 0 && inner.leases == 0
    }

    /// State listeners registered up to and including `last`.
    pub(crate) fn state_listeners_through(&self, last: ListenerId) -> Snapshot<ConnectionState> {
        self.lock().state.snapshot_through(last)
    }

    pub(crate) fn state_listener(&self, id: ListenerId) -> Option<Listener<ConnectionState>> {
        self.lock().state.get(id)
    }

    pub(crate) fn event_listeners(&self, event: &str) -> Option<Snapshot<Value>> {
        self.lock().events.get(event).map(ListenerSet::snapshot)
    }

    /// Drops every listener. Outstanding handles become no-ops.
    pub(crate) fn clear(&self) {
        let mut inner = self.lock();
        inner.state.clear();
        inner.events.clear();
        inner.listeners = 0;
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SubscriptionRegistry")
            .field("state_listeners", &inner.state.len())
            .field("event_names", &inner.events.len())
            .field("listeners", &inner.listeners)
            .field("leases", &inner.leases)
            .finish()
    }
}
