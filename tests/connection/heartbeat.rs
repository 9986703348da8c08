use std::time::Duration;

use realtime_link::mock::MockConnector;
use realtime_link::{ConnectionEvent, ConnectionManager, DisconnectReason};
use serde_json::{json, Value};

use super::common::{advance, builder, observed, settle};

const TICK: Duration = Duration::from_secs(30);

async fn ticks(count: u32) {
    for _ in 0..count {
        advance(TICK).await;
    }
}

async fn open(connector: &MockConnector, manager: &ConnectionManager) {
    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.connect().await }
    });
    settle().await;
    connector.last().unwrap().open();
    assert!(pending.await.unwrap());
    assert!(manager.timers().heartbeat_running);
}

#[tokio::test(start_paused = true)]
async fn probes_after_sixty_seconds_of_silence() {
    let connector = MockConnector::new();
    let manager = ConnectionManager::new(builder().build().unwrap(), connector.clone());
    open(&connector, &manager).await;
    let handle = connector.last().unwrap();

    ticks(2).await;
    assert!(handle.sent().is_empty());

    ticks(1).await;
    assert_eq!(handle.sent(), vec![("ping".to_string(), Value::Null)]);

    ticks(1).await;
    assert_eq!(handle.sent_events(), vec!["ping", "ping"]);
    assert!(manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn force_closes_after_two_minutes_of_silence() {
    let (builder, events) = observed();
    let connector = MockConnector::new();
    let manager = ConnectionManager::new(builder.build().unwrap(), connector.clone());
    open(&connector, &manager).await;
    let handle = connector.last().unwrap();

    ticks(4).await;
    assert!(manager.is_connected());

    ticks(1).await;
    assert!(handle.is_closed());
    assert!(!manager.is_connected());
    assert!(!manager.timers().heartbeat_running);
    assert!(manager.timers().reconnect_scheduled);

    let all = events.all();
    assert!(all.iter().any(|event| matches!(
        event,
        ConnectionEvent::StaleConnection { idle, .. } if *idle == Duration::from_secs(150)
    )));
    assert!(all.iter().any(|event| matches!(
        event,
        ConnectionEvent::Disconnected {
            reason: DisconnectReason::HeartbeatTimeout,
            ..
        }
    )));

    advance(Duration::from_secs(2)).await;
    assert_eq!(connector.opened(), 2);
    manager.disconnect();
}

#[tokio::test(start_paused = true)]
async fn pong_counts_as_activity() {
    let connector = MockConnector::new();
    let manager = ConnectionManager::new(builder().build().unwrap(), connector.clone());
    open(&connector, &manager).await;
    let handle = connector.last().unwrap();

    ticks(2).await;
    advance(Duration::from_secs(15)).await;
    handle.message("pong", json!({}));
    settle().await;

    // idle is 15s at 90s and 45s at 120s
    advance(Duration::from_secs(15)).await;
    ticks(1).await;
    assert!(handle.sent().is_empty());

    ticks(1).await;
    assert_eq!(handle.sent_events(), vec!["ping"]);
}

#[tokio::test(start_paused = true)]
async fn other_messages_do_not_count_as_activity() {
    let connector = MockConnector::new();
    let manager = ConnectionManager::new(builder().build().unwrap(), connector.clone());
    open(&connector, &manager).await;
    let handle = connector.last().unwrap();

    ticks(2).await;
    handle.message("room_update", json!({ "count": 1 }));
    settle().await;

    ticks(1).await;
    assert_eq!(handle.sent_events(), vec!["ping"]);
}

#[tokio::test(start_paused = true)]
async fn custom_probe_and_liveness_events() {
    let connector = MockConnector::new();
    let config = builder()
        .probe_event("heartbeat")
        .liveness_events(["heartbeat_ack", "presence"])
        .build()
        .unwrap();
    let manager = ConnectionManager::new(config, connector.clone());
    open(&connector, &manager).await;
    let handle = connector.last().unwrap();

    ticks(2).await;
    handle.message("presence", Value::Null);
    settle().await;
    ticks(1).await;
    assert!(handle.sent().is_empty());

    ticks(2).await;
    assert_eq!(handle.sent_events(), vec!["heartbeat"]);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_stops_when_disconnected() {
    let connector = MockConnector::new();
    let manager = ConnectionManager::new(builder().build().unwrap(), connector.clone());
    open(&connector, &manager).await;

    manager.disconnect();
    assert!(!manager.timers().heartbeat_running);

    ticks(6).await;
    assert!(connector.last().unwrap().sent().is_empty());
    assert_eq!(connector.opened(), 1);
}
