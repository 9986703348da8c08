//! Scoped subscription handles.

use std::sync::Weak;

use crate::manager::Shared;
use crate::registry::SubscriptionKey;

/// A registered state or message listener.
///
/// Dropping the handle, or calling [`Subscription::unsubscribe`], removes
/// exactly this listener. When it was the last one, the idle-teardown timer
/// starts.
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    shared: Weak<Shared>,
    key: Option<SubscriptionKey>,
}

impl Subscription {
    pub(crate) fn new(shared: Weak<Shared>, key: SubscriptionKey) -> Self {
        Self {
            shared,
            key: Some(key),
        }
    }

    /// Removes the listener now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Returns the subscribed message name, or `None` for a state listener.
    pub fn event(&self) -> Option<&str> {
        match &self.key {
            Some(SubscriptionKey::Event(event, _)) => Some(event),
            _ => None,
        }
    }

    fn release(&mut self) {
        if let Some(key) = self.key.take() {
            if let Some(shared) = self.shared.upgrade() {
                shared.remove_listener(&key);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Keeps the connection wanted without listening to anything.
///
/// Idle teardown only happens once every listener and every lease is gone.
#[must_use = "dropping a Lease releases it immediately"]
#[derive(Debug)]
pub struct Lease {
    shared: Weak<Shared>,
    held: bool,
}

impl Lease {
    pub(crate) fn new(shared: Weak<Shared>) -> Self {
        Self { shared, held: true }
    }

    /// Gives the lease back now.
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if std::mem::take(&mut self.held) {
            if let Some(shared) = self.shared.upgrade() {
                shared.release_lease();
            }
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.give_back();
    }
}
