//! Panic isolation for lifecycle and message listeners.
//!
//! Both `EventListeners::emit` and `Snapshot::dispatch` run every callback
//! under `catch_unwind`; one panicking callback must not prevent the rest
//! from being called.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use realtime_link_core::{EventListeners, FnListener, LinkEvent, ListenerSet};

#[derive(Debug, Clone)]
struct TestEvent {
    name: String,
    timestamp: Instant,
}

impl TestEvent {
    fn new() -> Self {
        Self {
            name: "test".to_string(),
            timestamp: Instant::now(),
        }
    }
}

impl LinkEvent for TestEvent {
    fn event_type(&self) -> &'static str {
        "test"
    }

    fn timestamp(&self) -> Instant {
        self.timestamp
    }

    fn link_name(&self) -> &str {
        &self.name
    }
}

#[test]
fn panic_in_one_event_listener_does_not_prevent_others() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let counter = Arc::new(AtomicUsize::new(0));
    let mut listeners = EventListeners::<TestEvent>::new();

    let c1 = Arc::clone(&counter);
    listeners.add(FnListener::new(move |_: &TestEvent| {
        c1.fetch_add(1, Ordering::SeqCst);
    }));
    listeners.add(FnListener::new(|_: &TestEvent| {
        panic!("listener 2 panics");
    }));
    let c3 = Arc::clone(&counter);
    listeners.add(FnListener::new(move |_: &TestEvent| {
        c3.fetch_add(1, Ordering::SeqCst);
    }));

    listeners.emit(&TestEvent::new());
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    // Still works on the next emit
    listeners.emit(&TestEvent::new());
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}

#[test]
fn dispatch_counts_panicking_callbacks() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut set: ListenerSet<str> = ListenerSet::new();

    set.insert(|_: &str| panic!("first"));
    let c = Arc::clone(&counter);
    set.insert(move |message: &str| {
        c.fetch_add(message.len(), Ordering::SeqCst);
    });
    set.insert(|_: &str| panic!("{}", String::from("formatted")));

    let panicked = set.snapshot().dispatch("hello");
    assert_eq!(panicked, 2);
    assert_eq!(counter.load(Ordering::SeqCst), 5);
}

#[test]
fn non_string_panic_payload_is_swallowed() {
    let mut set: ListenerSet<u32> = ListenerSet::new();
    set.insert(|_: &u32| std::panic::panic_any(7_u32));

    assert_eq!(set.snapshot().dispatch(&1), 1);
}
