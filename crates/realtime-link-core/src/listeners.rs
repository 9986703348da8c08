//! Ordered listener sets.
//!
//! A [`ListenerSet`] keeps callbacks in registration order and hands out a
//! [`ListenerId`] for each one so the owner can later remove exactly that
//! entry. Dispatch always goes through a [`Snapshot`] taken beforehand:
//! callbacks added or removed while a dispatch is running only take effect
//! for the next round.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A shared callback receiving a borrowed argument.
pub type Listener<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Identifies one entry in a [`ListenerSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Returns the raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callbacks kept in registration order.
pub struct ListenerSet<A: ?Sized> {
    next_id: u64,
    entries: Vec<(ListenerId, Listener<A>)>,
}

impl<A: ?Sized> ListenerSet<A> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Appends a callback and returns its id.
    pub fn insert<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Arc::new(listener)));
        id
    }

    /// Removes the callback registered under `id`.
    ///
    /// Returns `false` if it was already gone.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        match self.entries.iter().position(|(entry, _)| *entry == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns true if `id` is still registered.
    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    /// Returns the number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every callback.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Copies the current callbacks for dispatch.
    pub fn snapshot(&self) -> Snapshot<A> {
        self.collect(|_| true)
    }

    /// Copies the callbacks registered no later than `last`.
    ///
    /// Ids grow with every insert, so this is the set as it stood right
    /// after `last` was added, minus whatever was removed since.
    pub fn snapshot_through(&self, last: ListenerId) -> Snapshot<A> {
        self.collect(|id| id <= last)
    }

    /// Returns the callback registered under `id`.
    pub fn get(&self, id: ListenerId) -> Option<Listener<A>> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, listener)| Arc::clone(listener))
    }

    fn collect(&self, keep: impl Fn(ListenerId) -> bool) -> Snapshot<A> {
        Snapshot {
            listeners: self
                .entries
                .iter()
                .filter(|(id, _)| keep(*id))
                .map(|(_, listener)| Arc::clone(listener))
                .collect(),
        }
    }
}

impl<A: ?Sized> Default for ListenerSet<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> fmt::Debug for ListenerSet<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// The callbacks of a [`ListenerSet`] at one point in time.
pub struct Snapshot<A: ?Sized> {
    listeners: Vec<Listener<A>>,
}

impl<A: ?Sized> Snapshot<A> {
    /// Calls every callback in order with `arg`.
    ///
    /// A panicking callback is skipped over; the remaining callbacks still
    /// run. Returns the number of callbacks that panicked.
    pub fn dispatch(&self, arg: &A) -> usize {
        self.listeners
            .iter()
            .filter(|listener| !call_isolated(|| listener(arg)))
            .count()
    }

    /// Returns the number of callbacks captured.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// Runs `f`, swallowing a panic.
///
/// Returns `true` if `f` ran to completion.
pub fn call_isolated<F: FnOnce()>(f: F) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(_panic) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                panic = panic_message(&*_panic),
                "listener panicked; continuing delivery"
            );
            false
        }
    }
}

#[cfg(feature = "tracing")]
fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic>"
    }
}
