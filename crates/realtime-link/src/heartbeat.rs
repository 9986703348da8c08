//! Heartbeat supervisor.
//!
//! While connected, a periodic tick compares the time since the last
//! liveness-relevant inbound message against two thresholds: past the probe
//! threshold a lightweight probe is sent, past the force-close threshold the
//! transport is closed so the reconnection policy can take over.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::ConnectionConfig;
use crate::timer;

/// What a heartbeat tick should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeartbeatAction {
    /// Recent activity; nothing to do.
    Healthy,
    /// Quiet for a while; send a probe.
    Probe,
    /// Silent for too long; force-close.
    ForceClose,
}

/// Whether the supervisor keeps ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

pub(crate) fn assess(idle: Duration, config: &ConnectionConfig) -> HeartbeatAction {
    if idle > config.stale_force_close_threshold {
        HeartbeatAction::ForceClose
    } else if idle > config.stale_probe_threshold {
        HeartbeatAction::Probe
    } else {
        HeartbeatAction::Healthy
    }
}

/// Calls `tick` every `period` until it returns [`Flow::Stop`].
///
/// The first tick happens one full period after spawning.
pub(crate) fn spawn<F>(period: Duration, mut tick: F) -> Option<JoinHandle<()>>
where
    F: FnMut() -> Flow + Send + 'static,
{
    timer::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if tick() == Flow::Stop {
                break;
            }
        }
    })
}
