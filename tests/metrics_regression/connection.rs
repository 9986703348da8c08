//! Connection manager metrics regression tests

use std::time::Duration;

use super::helpers::*;
use realtime_link::mock::MockConnector;
use realtime_link::{ConnectionConfig, ConnectionManager};
use serial_test::serial;

fn manager(name: &str, connector: &MockConnector) -> ConnectionManager {
    let config = ConnectionConfig::builder()
        .name(name)
        .url("wss://example.test/socket")
        .build()
        .unwrap();
    ConnectionManager::new(config, connector.clone())
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
#[serial]
async fn connect_and_disconnect_metrics() {
    init_recorder();
    let connector = MockConnector::new().auto_open();
    let manager = manager("metrics_lifecycle", &connector);

    assert!(manager.connect().await);
    assert_eq!(
        counter("realtime_link_connect_attempts_total", "metrics_lifecycle"),
        Some(1)
    );
    assert_eq!(
        counter("realtime_link_connections_total", "metrics_lifecycle"),
        Some(1)
    );
    assert_eq!(gauge("realtime_link_connected", "metrics_lifecycle"), Some(1.0));

    manager.disconnect();
    assert_eq!(gauge("realtime_link_connected", "metrics_lifecycle"), Some(0.0));
    assert_metric_has_label("realtime_link_disconnects_total", "reason", "manual");
}

#[tokio::test(start_paused = true)]
#[serial]
async fn reconnect_and_heartbeat_metrics() {
    init_recorder();
    let connector = MockConnector::new().auto_open();
    let manager = manager("metrics_reconnect", &connector);
    let _sub = manager.subscribe_event("room_update", |_| {});
    assert!(manager.connect().await);

    for _ in 0..5 {
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
    }
    assert_eq!(
        counter("realtime_link_heartbeat_probes_total", "metrics_reconnect"),
        Some(2)
    );
    assert_eq!(
        counter("realtime_link_stale_closes_total", "metrics_reconnect"),
        Some(1)
    );
    assert_eq!(
        counter("realtime_link_reconnects_scheduled_total", "metrics_reconnect"),
        Some(1)
    );
    assert_metric_has_label(
        "realtime_link_disconnects_total",
        "reason",
        "heartbeat_timeout",
    );

    assert_eq!(
        gauge("realtime_link_listeners", "metrics_reconnect"),
        Some(1.0)
    );
    manager.disconnect();
}
