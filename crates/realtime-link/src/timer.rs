//! One-shot timers owned by the controller.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Holds at most one live timer task.
///
/// Each armed task carries an id. A task that already woke up but lost the
/// race with [`TimerSlot::cancel`] finds its id gone in
/// [`TimerSlot::fire`] and must do nothing.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    active: Option<(u64, JoinHandle<()>)>,
}

impl TimerSlot {
    /// Replaces the current timer, cancelling it.
    pub(crate) fn arm(&mut self, id: u64, task: Option<JoinHandle<()>>) {
        self.cancel();
        self.active = task.map(|task| (id, task));
    }

    /// Cancels the current timer. Returns true if one was armed.
    pub(crate) fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some((_, task)) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Claims the slot for the timer `id` that is firing now.
    ///
    /// Returns false if that timer was cancelled or replaced.
    pub(crate) fn fire(&mut self, id: u64) -> bool {
        if self.is_current(id) {
            self.active = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_current(&self, id: u64) -> bool {
        matches!(self.active, Some((current, _)) if current == id)
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.active.is_some()
    }
}

/// Spawns `f` after `delay` on the current runtime.
///
/// Returns `None` outside a tokio runtime.
pub(crate) fn spawn_after<F>(delay: Duration, f: F) -> Option<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    spawn(async move {
        tokio::time::sleep(delay).await;
        f();
    })
}

/// Spawns `future` on the current runtime, if there is one.
pub(crate) fn spawn<F>(future: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    Handle::try_current()
        .ok()
        .map(|handle| handle.spawn(future))
}
