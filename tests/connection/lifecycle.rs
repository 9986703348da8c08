use std::time::Duration;

use realtime_link::mock::MockConnector;
use realtime_link::{
    ConnectionError, ConnectionManager, ConnectionPhase, ConnectionState, TransportError,
};
use serde_json::{json, Value};

use super::common::{advance, builder, event_types, manager, observed, settle, Recorder};

#[tokio::test(start_paused = true)]
async fn new_subscriber_sees_idle_baseline() {
    let manager = manager(&MockConnector::new());
    let states = Recorder::new();

    let s = states.clone();
    let _sub = manager.subscribe_state(move |state: &ConnectionState| s.push(state.clone()));

    assert_eq!(states.all(), vec![ConnectionState::idle()]);
    let state = states.last().unwrap();
    assert!(!state.is_connected());
    assert!(!state.is_connecting());
    assert_eq!(state.error(), None);
    assert_eq!(state.reconnect_attempts(), 0);
    assert_eq!(state.last_connected(), None);
}

#[tokio::test(start_paused = true)]
async fn connect_goes_through_connecting_to_connected() {
    let connector = MockConnector::new();
    let manager = manager(&connector);
    let states = Recorder::new();
    let s = states.clone();
    let _sub = manager.subscribe_state(move |state: &ConnectionState| s.push(state.clone()));

    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.connect().await }
    });
    settle().await;

    assert!(manager.state().is_connecting());
    assert_eq!(manager.state().phase(), ConnectionPhase::Connecting);

    connector.last().unwrap().open();
    assert!(pending.await.unwrap());

    let state = manager.state();
    assert!(state.is_connected());
    assert!(!state.is_connecting());
    assert_eq!(state.reconnect_attempts(), 0);
    assert!(state.last_connected().is_some());

    let phases: Vec<_> = states.all().iter().map(ConnectionState::phase).collect();
    assert_eq!(
        phases,
        vec![
            ConnectionPhase::Idle,
            ConnectionPhase::Connecting,
            ConnectionPhase::Connected
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn connect_passes_url_and_token() {
    let connector = MockConnector::new().auto_open();
    let manager = manager(&connector);

    assert!(manager.connect().await);
    let request = connector.last().unwrap().request().clone();
    assert_eq!(request.url, "wss://example.test/socket");
    assert_eq!(request.auth_token.as_deref(), Some("token"));
    assert_eq!(request.attempt, 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_connects_share_one_transport() {
    let connector = MockConnector::new();
    let manager = manager(&connector);

    let calls: Vec<_> = (0..5)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.connect().await })
        })
        .collect();
    settle().await;

    assert_eq!(connector.opened(), 1);
    connector.last().unwrap().open();
    for call in calls {
        assert!(call.await.unwrap());
    }
    assert_eq!(connector.opened(), 1);

    assert!(manager.connect().await);
    assert_eq!(connector.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_failure_resolves_false() {
    let connector = MockConnector::new();
    let manager = manager(&connector);

    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.connect().await }
    });
    settle().await;
    connector
        .last()
        .unwrap()
        .error(TransportError::Network("connection refused".into()));

    assert!(!pending.await.unwrap());
    let state = manager.state();
    assert!(!state.is_connected());
    assert!(!state.is_connecting());
    assert!(matches!(state.error(), Some(ConnectionError::Transport(_))));
    manager.disconnect();
}

#[tokio::test(start_paused = true)]
async fn connect_times_out() {
    let connector = MockConnector::new();
    let manager = manager(&connector);

    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.connect().await }
    });
    settle().await;
    advance(Duration::from_millis(14_999)).await;
    assert!(!pending.is_finished());

    advance(Duration::from_millis(1)).await;
    assert!(!pending.await.unwrap());
    assert_eq!(
        manager.state().error(),
        Some(&ConnectionError::Timeout(Duration::from_secs(15)))
    );
    assert!(connector.handle(0).unwrap().is_closed());
    manager.disconnect();
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_pending_connect_does_not_resurrect() {
    let (builder, events) = observed();
    let connector = MockConnector::new();
    let manager = ConnectionManager::new(builder.build().unwrap(), connector.clone());

    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.connect().await }
    });
    settle().await;
    manager.disconnect();
    assert!(!pending.await.unwrap());

    let handle = connector.last().unwrap();
    assert!(handle.is_closed());
    handle.open();
    settle().await;

    assert_eq!(manager.state(), ConnectionState::idle());
    assert!(manager.timers().is_quiet());
    assert_eq!(event_types(&events), vec!["connecting", "disconnected"]);
}

#[tokio::test(start_paused = true)]
async fn disconnect_returns_to_baseline_and_is_idempotent() {
    let connector = MockConnector::new().auto_open();
    let manager = manager(&connector);
    let states = Recorder::new();
    let s = states.clone();
    let _sub = manager.subscribe_state(move |state: &ConnectionState| s.push(state.clone()));

    assert!(manager.connect().await);
    manager.disconnect();
    let after_first = states.len();
    manager.disconnect();
    manager.disconnect();

    assert_eq!(states.len(), after_first);
    let state = manager.state();
    assert!(!state.is_connected());
    assert_eq!(state.error(), None);
    assert_eq!(state.reconnect_attempts(), 0);
    assert!(state.last_connected().is_some());
    assert!(connector.last().unwrap().is_closed());
    assert!(manager.timers().is_quiet());
}

#[tokio::test(start_paused = true)]
async fn emit_while_disconnected_returns_false() {
    let connector = MockConnector::new();
    let manager = manager(&connector);

    assert!(!manager.emit("ping", Value::Null));
    assert_eq!(connector.opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn emit_while_connected_sends() {
    let connector = MockConnector::new().auto_open();
    let manager = manager(&connector);
    assert!(manager.connect().await);

    assert!(manager.emit("join", json!({ "room": "lobby" })));
    let handle = connector.last().unwrap();
    assert_eq!(handle.sent(), vec![("join".to_string(), json!({ "room": "lobby" }))]);

    handle.fail_sends(true);
    assert!(!manager.emit("join", json!({ "room": "attic" })));
    assert_eq!(handle.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn reset_clears_error_without_reconnecting() {
    let connector = MockConnector::new();
    let manager = ConnectionManager::new(
        builder().max_reconnect_attempts(0).build().unwrap(),
        connector.clone(),
    );

    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.connect().await }
    });
    settle().await;
    connector
        .last()
        .unwrap()
        .error(TransportError::Network("unreachable".into()));
    assert!(!pending.await.unwrap());
    assert!(manager.state().error().is_some());

    manager.reset();
    let state = manager.state();
    assert_eq!(state.error(), None);
    assert_eq!(state.reconnect_attempts(), 0);
    assert!(!state.is_connected());
    assert_eq!(connector.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn reset_from_a_listener_is_the_last_state_delivered() {
    let connector = MockConnector::new();
    let manager = ConnectionManager::new(
        builder().max_reconnect_attempts(0).build().unwrap(),
        connector.clone(),
    );
    let states = Recorder::new();

    let inner = manager.clone();
    let s = states.clone();
    let _sub = manager.subscribe_state(move |state: &ConnectionState| {
        s.push(state.clone());
        if matches!(state.error(), Some(ConnectionError::Transport(_))) {
            inner.reset();
        }
    });

    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.connect().await }
    });
    settle().await;
    connector
        .last()
        .unwrap()
        .error(TransportError::Network("unreachable".into()));
    assert!(!pending.await.unwrap());
    settle().await;

    let errors: Vec<_> = states
        .all()
        .iter()
        .map(|state| state.error().cloned())
        .collect();
    assert_eq!(
        errors[errors.len() - 3..],
        [
            Some(ConnectionError::Transport("network error: unreachable".into())),
            Some(ConnectionError::MaxAttemptsReached { attempts: 0 }),
            None,
        ]
    );
    assert_eq!(states.last(), Some(manager.state()));
    assert_eq!(manager.state().error(), None);
}
