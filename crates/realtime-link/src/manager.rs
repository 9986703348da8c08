//! The connection controller.
//!
//! [`ConnectionManager`] owns the transport handle and the authoritative
//! [`ConnectionState`]. Everything that changes either goes through
//! [`Shared`] while its lock is held. Side effects are collected into
//! [`Effects`] and run after the lock is released, so listeners are free to
//! call back into the manager.
//!
//! State snapshots take a separate route: each transition is queued in
//! `Core::outbox` under the lock, and whichever caller finds the outbox
//! idle drains it. Listeners therefore see transitions in the order they
//! happened, even when another thread or a listener triggers the next one
//! mid-delivery, and the last snapshot a listener receives is always the
//! manager's current state.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};
use realtime_link_core::{call_isolated, ListenerId};
use serde_json::Value;
#[cfg(feature = "metrics")]
use std::sync::Once;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, ErrorClass, TransportError};
use crate::events::{ConnectionEvent, DisconnectReason};
use crate::heartbeat::{self, Flow, HeartbeatAction};
use crate::registry::{SubscriptionKey, SubscriptionRegistry};
use crate::state::ConnectionState;
use crate::subscription::{Lease, Subscription};
use crate::timer::{self, TimerSlot};
use crate::transport::{
    CloseReason, ConnectRequest, Connector, Transport, TransportEvent, TransportEvents,
};

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "realtime_link_connect_attempts_total",
            "Transports opened, including automatic reconnects"
        );
        describe_counter!(
            "realtime_link_connections_total",
            "Transports that completed their handshake"
        );
        describe_counter!(
            "realtime_link_disconnects_total",
            "Connections lost or released, by reason"
        );
        describe_counter!(
            "realtime_link_reconnects_scheduled_total",
            "Automatic reconnects scheduled"
        );
        describe_counter!(
            "realtime_link_heartbeat_probes_total",
            "Liveness probes sent by the heartbeat"
        );
        describe_counter!(
            "realtime_link_stale_closes_total",
            "Transports force-closed for silence"
        );
        describe_gauge!("realtime_link_listeners", "Registered listeners");
        describe_gauge!(
            "realtime_link_connected",
            "1 while the transport is open, 0 otherwise"
        );
    });
}

/// Which timers are live right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerStatus {
    /// An automatic reconnect is waiting for its backoff delay.
    pub reconnect_scheduled: bool,
    /// The heartbeat supervisor is ticking.
    pub heartbeat_running: bool,
    /// The idle-teardown timer is counting down.
    pub idle_teardown_pending: bool,
    /// A connect attempt is racing its timeout.
    pub connect_timeout_pending: bool,
}

impl TimerStatus {
    /// Returns true if no timer is live.
    pub fn is_quiet(&self) -> bool {
        *self == TimerStatus::default()
    }
}

/// A single, shared, self-healing connection to a realtime server.
///
/// Create one per process at the application boundary and hand clones to
/// the features that need it; clones share the same transport, state and
/// listeners.
///
/// No public operation returns an error or panics on failure: outcomes are
/// reported through [`ConnectionState::error`] and the `bool` results of
/// [`connect`](Self::connect) and [`emit`](Self::emit).
///
/// # Examples
///
/// ```
/// use realtime_link::{
///     ConnectRequest, ConnectionConfig, ConnectionManager, Transport, TransportError,
///     TransportEvents,
/// };
/// use serde_json::Value;
///
/// struct Loopback;
///
/// impl Transport for Loopback {
///     fn send(&self, _event: &str, _payload: &Value) -> Result<(), TransportError> {
///         Ok(())
///     }
///     fn close(&self) {}
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConnectionConfig::builder()
///     .url("wss://example.test/socket")
///     .auth_token("token")
///     .build()?;
/// let manager = ConnectionManager::new(
///     config,
///     |_request: ConnectRequest, events: TransportEvents| -> Box<dyn Transport> {
///         events.open();
///         Box::new(Loopback)
///     },
/// );
///
/// let _presence = manager.subscribe_event("room_update", |payload| {
///     println!("room update: {payload}");
/// });
///
/// if manager.connect().await {
///     manager.emit("join", serde_json::json!({ "room": "lobby" }));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    config: ConnectionConfig,
    connector: Box<dyn Connector>,
    core: Mutex<Core>,
    registry: SubscriptionRegistry,
}

struct ActiveTransport {
    generation: u64,
    handle: Box<dyn Transport>,
    pump: Option<JoinHandle<()>>,
}

impl ActiveTransport {
    fn retire(self) -> Box<dyn Transport> {
        if let Some(pump) = self.pump {
            pump.abort();
        }
        self.handle
    }
}

struct PendingConnect {
    generation: u64,
    waiters: Vec<oneshot::Sender<bool>>,
}

/// A transport to open once the lock is released.
struct OpenAttempt {
    generation: u64,
    request: ConnectRequest,
    events: TransportEvents,
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

enum StateDelivery {
    /// A transition, for listeners registered up to `through`.
    Broadcast {
        state: ConnectionState,
        through: ListenerId,
    },
    /// The snapshot a new listener starts from.
    Initial {
        listener: ListenerId,
        state: ConnectionState,
    },
}

struct Core {
    state: ConnectionState,
    transport: Option<ActiveTransport>,
    pending: Option<PendingConnect>,
    generation: u64,
    timer_ids: u64,
    reconnect_timer: TimerSlot,
    heartbeat: TimerSlot,
    idle_timer: TimerSlot,
    connect_timeout: TimerSlot,
    last_activity: Instant,
    outbox: VecDeque<StateDelivery>,
    delivering: bool,
    newest_state_listener: Option<ListenerId>,
}

impl Core {
    fn new() -> Self {
        Self {
            state: ConnectionState::idle(),
            transport: None,
            pending: None,
            generation: 0,
            timer_ids: 0,
            reconnect_timer: TimerSlot::default(),
            heartbeat: TimerSlot::default(),
            idle_timer: TimerSlot::default(),
            connect_timeout: TimerSlot::default(),
            last_activity: Instant::now(),
            outbox: VecDeque::new(),
            delivering: false,
            newest_state_listener: None,
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if next == self.state {
            return;
        }
        self.state = next.clone();
        if let Some(through) = self.newest_state_listener {
            self.outbox
                .push_back(StateDelivery::Broadcast { state: next, through });
        }
    }

    fn cancel_timers(&mut self) {
        self.reconnect_timer.cancel();
        self.heartbeat.cancel();
        self.idle_timer.cancel();
        self.connect_timeout.cancel();
    }

    fn is_current(&self, generation: u64) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|transport| transport.generation == generation)
    }

    fn next_timer_id(&mut self) -> u64 {
        self.timer_ids += 1;
        self.timer_ids
    }

    fn retire_transport(&mut self, effects: &mut Effects) {
        if let Some(transport) = self.transport.take() {
            effects.retired.push(transport.retire());
        }
    }

    fn settle_pending(&mut self, effects: &mut Effects, outcome: bool) {
        if let Some(pending) = self.pending.take() {
            effects
                .resolved
                .extend(pending.waiters.into_iter().map(|waiter| (waiter, outcome)));
        }
    }
}

#[derive(Default)]
struct Effects {
    events: Vec<ConnectionEvent>,
    retired: Vec<Box<dyn Transport>>,
    open: Option<OpenAttempt>,
    resolved: Vec<(oneshot::Sender<bool>, bool)>,
    message: Option<(String, Value)>,
}

impl ConnectionManager {
    /// Creates an idle manager. Nothing is opened until [`connect`](Self::connect).
    pub fn new<C: Connector>(config: ConnectionConfig, connector: C) -> Self {
        #[cfg(feature = "metrics")]
        describe_metrics();

        Self {
            shared: Arc::new(Shared {
                config,
                connector: Box::new(connector),
                core: Mutex::new(Core::new()),
                registry: SubscriptionRegistry::default(),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state.clone()
    }

    /// Shorthand for `state().is_connected()`.
    pub fn is_connected(&self) -> bool {
        self.shared.lock().state.is_connected()
    }

    /// Opens the connection.
    ///
    /// Resolves `true` immediately when already connected. While an attempt
    /// is in flight every caller awaits that same attempt, so concurrent
    /// calls never open a second transport. Resolves `false` on error,
    /// timeout, or when [`disconnect`](Self::disconnect) interrupts the
    /// attempt.
    pub async fn connect(&self) -> bool {
        let mut effects = Effects::default();
        let outcome = {
            let mut core = self.shared.lock();
            if core.state.is_connected() {
                return true;
            }
            if core.pending.is_none() {
                self.shared.begin_attempt(&mut core, &mut effects, false);
            }
            let (tx, rx) = oneshot::channel();
            if let Some(pending) = core.pending.as_mut() {
                pending.waiters.push(tx);
            }
            rx
        };
        self.shared.apply(effects);
        outcome.await.unwrap_or(false)
    }

    /// Closes the transport, cancels every timer and returns to the idle
    /// baseline. Idempotent.
    pub fn disconnect(&self) {
        self.shared.teardown(DisconnectReason::Manual);
    }

    /// Sends a named message.
    ///
    /// Returns `false` without side effects when not connected. A `false`
    /// means the message was dropped; nothing is queued.
    pub fn emit(&self, event: &str, payload: Value) -> bool {
        let core = self.shared.lock();
        if !core.state.is_connected() {
            return false;
        }
        let Some(transport) = core.transport.as_ref() else {
            return false;
        };
        match transport.handle.send(event, &payload) {
            Ok(()) => true,
            Err(_error) => {
                #[cfg(feature = "tracing")]
                debug!(link = %self.shared.config.name, event, error = %_error, "emit dropped");
                false
            }
        }
    }

    /// Clears the error and the reconnect counter without touching the
    /// transport, so a user can retry after automatic attempts ran out.
    pub fn reset(&self) {
        let mut effects = Effects::default();
        {
            let mut core = self.shared.lock();
            let next = core.state.reset();
            core.transition(next);
        }
        self.shared.apply(effects);
    }

    /// Registers a state listener.
    ///
    /// The listener is first called with the current state, then on every
    /// later transition, in registration order. The first call happens
    /// before this returns unless another thread is delivering states at
    /// that moment, in which case that thread hands it over in sequence.
    pub fn subscribe_state<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        let id = {
            let mut core = self.shared.lock();
            let id = self.shared.registry.add_state(listener);
            core.newest_state_listener = Some(id);
            let state = core.state.clone();
            core.outbox.push_back(StateDelivery::Initial { listener: id, state });
            id
        };
        self.shared.listener_added();
        self.shared.deliver_states();
        Subscription::new(Arc::downgrade(&self.shared), SubscriptionKey::State(id))
    }

    /// Registers a listener for inbound messages named `event`.
    pub fn subscribe_event<F>(&self, event: &str, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let key = self.shared.registry.add_event(event, listener);
        self.shared.listener_added();
        Subscription::new(Arc::downgrade(&self.shared), key)
    }

    /// Keeps the connection from being torn down while no listener exists.
    pub fn lease(&self) -> Lease {
        self.shared.registry.acquire_lease();
        self.shared.cancel_idle_teardown();
        Lease::new(Arc::downgrade(&self.shared))
    }

    /// Number of registered state and message listeners.
    pub fn listener_count(&self) -> usize {
        self.shared.registry.listener_count()
    }

    /// Number of outstanding leases.
    pub fn lease_count(&self) -> usize {
        self.shared.registry.lease_count()
    }

    /// Reports which timers are live.
    pub fn timers(&self) -> TimerStatus {
        let core = self.shared.lock();
        TimerStatus {
            reconnect_scheduled: core.reconnect_timer.is_armed(),
            heartbeat_running: core.heartbeat.is_armed(),
            idle_teardown_pending: core.idle_timer.is_armed(),
            connect_timeout_pending: core.connect_timeout.is_armed(),
        }
    }

    /// Disconnects and drops every listener. Outstanding [`Subscription`]s
    /// become no-ops and no idle teardown is scheduled.
    pub fn dispose(&self) {
        self.shared.teardown(DisconnectReason::Manual);
        self.shared.registry.clear();
        #[cfg(feature = "metrics")]
        gauge!("realtime_link_listeners", "link" => self.shared.config.name.clone()).set(0.0);
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("name", &self.shared.config.name)
            .field("state", &self.state())
            .field("registry", &self.shared.registry)
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn apply(self: &Arc<Self>, effects: Effects) {
        let Effects {
            events,
            retired,
            open,
            resolved,
            message,
        } = effects;

        for transport in retired {
            transport.close();
        }
        if let Some(attempt) = open {
            self.open_transport(attempt);
        }
        self.deliver_states();
        for (waiter, outcome) in resolved {
            let _ = waiter.send(outcome);
        }
        for event in &events {
            self.config.event_listeners.emit(event);
        }
        if let Some((event, payload)) = message {
            if let Some(listeners) = self.registry.event_listeners(&event) {
                listeners.dispatch(&payload);
            }
        }
    }

    /// Drains the state outbox unless another caller already is.
    fn deliver_states(&self) {
        {
            let mut core = self.lock();
            if core.delivering {
                return;
            }
            core.delivering = true;
        }
        loop {
            let next = {
                let mut core = self.lock();
                let next = core.outbox.pop_front();
                core.delivering = next.is_some();
                next
            };
            match next {
                Some(StateDelivery::Broadcast { state, through }) => {
                    self.registry
                        .state_listeners_through(through)
                        .dispatch(&state);
                }
                Some(StateDelivery::Initial { listener, state }) => {
                    if let Some(listener) = self.registry.state_listener(listener) {
                        call_isolated(|| listener(&state));
                    }
                }
                None => return,
            }
        }
    }

    /// Closes whatever transport exists and starts a new attempt. The
    /// transport itself is opened by [`open_transport`](Self::open_transport)
    /// once the lock is released.
    fn begin_attempt(self: &Arc<Self>, core: &mut Core, effects: &mut Effects, retry: bool) {
        core.reconnect_timer.cancel();
        core.heartbeat.cancel();
        core.connect_timeout.cancel();
        core.retire_transport(effects);

        let next = if retry {
            core.state.retrying()
        } else {
            core.state.connecting()
        };
        core.transition(next);

        core.generation += 1;
        let generation = core.generation;
        let attempt = core.state.reconnect_attempts();

        let (events, rx) = TransportEvents::channel();
        effects.open = Some(OpenAttempt {
            generation,
            request: ConnectRequest {
                url: self.config.url.clone(),
                auth_token: self.config.auth_token.clone(),
                attempt,
            },
            events,
            rx,
        });

        let waiters = core
            .pending
            .take()
            .map(|pending| pending.waiters)
            .unwrap_or_default();
        core.pending = Some(PendingConnect {
            generation,
            waiters,
        });

        let weak = Arc::downgrade(self);
        core.connect_timeout.arm(
            generation,
            timer::spawn_after(self.config.connect_timeout, move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_connect_timeout(generation);
                }
            }),
        );

        effects
            .events
            .push(ConnectionEvent::connecting(self.name(), attempt));

        #[cfg(feature = "tracing")]
        info!(link = %self.config.name, url = %self.config.url, attempt, "connecting");

        #[cfg(feature = "metrics")]
        counter!("realtime_link_connect_attempts_total", "link" => self.config.name.clone())
            .increment(1);
    }

    /// Opens the transport for `attempt` and installs it, or closes it right
    /// away if the attempt was abandoned while the connector ran.
    fn open_transport(self: &Arc<Self>, attempt: OpenAttempt) {
        let OpenAttempt {
            generation,
            request,
            events,
            rx,
        } = attempt;
        let handle = self.connector.open(request, events);

        let mut core = self.lock();
        let wanted = core.generation == generation
            && core
                .pending
                .as_ref()
                .is_some_and(|pending| pending.generation == generation);
        if !wanted {
            drop(core);
            handle.close();
            #[cfg(feature = "tracing")]
            debug!(link = %self.config.name, generation, "attempt abandoned while opening");
            return;
        }
        let pump = self.spawn_pump(generation, rx);
        core.transport = Some(ActiveTransport {
            generation,
            handle,
            pump,
        });
    }

    fn spawn_pump(
        self: &Arc<Self>,
        generation: u64,
        mut rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Option<JoinHandle<()>> {
        let weak = Arc::downgrade(self);
        timer::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if !shared.on_transport_event(generation, event) {
                    break;
                }
            }
        })
    }

    /// Returns false once `generation` is no longer the live transport.
    fn on_transport_event(self: &Arc<Self>, generation: u64, event: TransportEvent) -> bool {
        let mut effects = Effects::default();
        {
            let mut core = self.lock();
            if !core.is_current(generation) {
                return false;
            }
            match event {
                TransportEvent::Open => self.handle_open(&mut core, &mut effects, generation),
                TransportEvent::Close(reason) => self.handle_close(&mut core, &mut effects, reason),
                TransportEvent::Error(error) => self.handle_error(&mut core, &mut effects, error),
                TransportEvent::Message { event, payload } => {
                    if self.config.is_liveness_event(&event) {
                        core.last_activity = Instant::now();
                    }
                    effects.message = Some((event, payload));
                }
            }
        }
        self.apply(effects);
        true
    }

    fn handle_open(self: &Arc<Self>, core: &mut Core, effects: &mut Effects, generation: u64) {
        if core.state.is_connected() {
            return;
        }
        core.connect_timeout.cancel();
        core.reconnect_timer.cancel();
        core.settle_pending(effects, true);
        core.last_activity = Instant::now();

        let next = core.state.connected(SystemTime::now());
        core.transition(next);
        self.start_heartbeat(core, generation);
        effects.events.push(ConnectionEvent::connected(self.name()));

        #[cfg(feature = "tracing")]
        info!(link = %self.config.name, "connected");

        #[cfg(feature = "metrics")]
        {
            counter!("realtime_link_connections_total", "link" => self.config.name.clone())
                .increment(1);
            gauge!("realtime_link_connected", "link" => self.config.name.clone()).set(1.0);
        }
    }

    fn handle_close(self: &Arc<Self>, core: &mut Core, effects: &mut Effects, reason: CloseReason) {
        let reconnect = !reason.is_client_initiated();
        self.connection_lost(core, effects, DisconnectReason::from(reason), reconnect);
    }

    fn handle_error(self: &Arc<Self>, core: &mut Core, effects: &mut Effects, error: TransportError) {
        let class = self.config.classify(&error);
        let failure = ConnectionError::from_transport(&error, class);
        self.fail_attempt(core, effects, failure, class == ErrorClass::Retryable);
    }

    fn on_connect_timeout(self: &Arc<Self>, generation: u64) {
        let mut effects = Effects::default();
        {
            let mut core = self.lock();
            if !core.connect_timeout.fire(generation) {
                return;
            }
            let pending = core.pending.as_ref().map(|pending| pending.generation);
            if pending != Some(generation) {
                return;
            }
            let failure = ConnectionError::Timeout(self.config.connect_timeout);
            self.fail_attempt(&mut core, &mut effects, failure, true);
        }
        self.apply(effects);
    }

    /// Discards the transport after an error or timeout.
    fn fail_attempt(
        self: &Arc<Self>,
        core: &mut Core,
        effects: &mut Effects,
        failure: ConnectionError,
        reconnect: bool,
    ) {
        let was_connected = core.state.is_connected();
        core.retire_transport(effects);
        core.heartbeat.cancel();
        core.connect_timeout.cancel();
        core.settle_pending(effects, false);

        let next = core.state.failed(failure.clone());
        core.transition(next);
        if was_connected {
            effects.events.push(ConnectionEvent::disconnected(
                self.name(),
                DisconnectReason::Transport(failure.to_string()),
            ));
        }
        effects
            .events
            .push(ConnectionEvent::connect_failed(self.name(), failure.clone()));

        if reconnect {
            #[cfg(feature = "tracing")]
            info!(link = %self.config.name, error = %failure, "connection attempt failed");
            self.schedule_reconnect(core, effects);
        } else {
            core.reconnect_timer.cancel();
            #[cfg(feature = "tracing")]
            warn!(link = %self.config.name, error = %failure, "fatal connection error; not reconnecting");
        }
    }

    /// Marks the connection closed and, unless the close was local, hands
    /// over to the reconnection policy.
    fn connection_lost(
        self: &Arc<Self>,
        core: &mut Core,
        effects: &mut Effects,
        reason: DisconnectReason,
        reconnect: bool,
    ) {
        core.retire_transport(effects);
        core.heartbeat.cancel();
        core.connect_timeout.cancel();
        core.settle_pending(effects, false);

        let next = core.state.closed();
        core.transition(next);

        #[cfg(feature = "tracing")]
        info!(link = %self.config.name, reason = ?reason, "disconnected");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "realtime_link_disconnects_total",
                "link" => self.config.name.clone(),
                "reason" => reason.label()
            )
            .increment(1);
            gauge!("realtime_link_connected", "link" => self.config.name.clone()).set(0.0);
        }

        effects
            .events
            .push(ConnectionEvent::disconnected(self.name(), reason));

        if reconnect {
            self.schedule_reconnect(core, effects);
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, core: &mut Core, effects: &mut Effects) {
        core.reconnect_timer.cancel();
        let attempts = core.state.reconnect_attempts();

        if let Some(max) = self.config.max_reconnect_attempts {
            if attempts >= max {
                let next = core
                    .state
                    .with_error(ConnectionError::MaxAttemptsReached { attempts });
                core.transition(next);
                effects
                    .events
                    .push(ConnectionEvent::reconnect_exhausted(self.name(), attempts));

                #[cfg(feature = "tracing")]
                warn!(link = %self.config.name, attempts, "max reconnect attempts reached");
                return;
            }
        }

        let Some(delay) = self.config.policy.delay_for_attempt(attempts as usize) else {
            #[cfg(feature = "tracing")]
            debug!(link = %self.config.name, "automatic reconnection disabled");
            return;
        };

        let id = core.next_timer_id();
        let weak = Arc::downgrade(self);
        core.reconnect_timer.arm(
            id,
            timer::spawn_after(delay, move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_reconnect_timer(id);
                }
            }),
        );
        effects.events.push(ConnectionEvent::reconnect_scheduled(
            self.name(),
            attempts + 1,
            delay,
        ));

        #[cfg(feature = "tracing")]
        debug!(link = %self.config.name, attempt = attempts + 1, ?delay, "reconnect scheduled");

        #[cfg(feature = "metrics")]
        counter!("realtime_link_reconnects_scheduled_total", "link" => self.config.name.clone())
            .increment(1);
    }

    fn on_reconnect_timer(self: &Arc<Self>, id: u64) {
        let mut effects = Effects::default();
        {
            let mut core = self.lock();
            if !core.reconnect_timer.fire(id) {
                return;
            }
            self.begin_attempt(&mut core, &mut effects, true);
        }
        self.apply(effects);
    }

    fn start_heartbeat(self: &Arc<Self>, core: &mut Core, generation: u64) {
        let weak = Arc::downgrade(self);
        let task = heartbeat::spawn(self.config.heartbeat_interval, move || {
            match weak.upgrade() {
                Some(shared) => shared.on_heartbeat_tick(generation),
                None => Flow::Stop,
            }
        });
        core.heartbeat.arm(generation, task);
    }

    fn on_heartbeat_tick(self: &Arc<Self>, generation: u64) -> Flow {
        let mut effects = Effects::default();
        let flow = {
            let mut core = self.lock();
            if !core.heartbeat.is_current(generation)
                || !core.is_current(generation)
                || !core.state.is_connected()
            {
                return Flow::Stop;
            }

            let idle = core.last_activity.elapsed();
            match heartbeat::assess(idle, &self.config) {
                HeartbeatAction::Healthy => Flow::Continue,
                HeartbeatAction::Probe => {
                    if let Some(transport) = core.transport.as_ref() {
                        let _ = transport.handle.send(&self.config.probe_event, &Value::Null);
                    }
                    effects
                        .events
                        .push(ConnectionEvent::heartbeat_probe(self.name(), idle));

                    #[cfg(feature = "tracing")]
                    debug!(link = %self.config.name, ?idle, "heartbeat probe");

                    #[cfg(feature = "metrics")]
                    counter!("realtime_link_heartbeat_probes_total", "link" => self.config.name.clone())
                        .increment(1);
                    Flow::Continue
                }
                HeartbeatAction::ForceClose => {
                    core.heartbeat.fire(generation);
                    effects
                        .events
                        .push(ConnectionEvent::stale_connection(self.name(), idle));

                    #[cfg(feature = "tracing")]
                    warn!(link = %self.config.name, ?idle, "connection went silent; forcing close");

                    #[cfg(feature = "metrics")]
                    counter!("realtime_link_stale_closes_total", "link" => self.config.name.clone())
                        .increment(1);

                    self.connection_lost(
                        &mut core,
                        &mut effects,
                        DisconnectReason::HeartbeatTimeout,
                        true,
                    );
                    Flow::Stop
                }
            }
        };
        self.apply(effects);
        flow
    }

    /// Cancels every timer, closes the transport and resets the state.
    fn teardown(self: &Arc<Self>, reason: DisconnectReason) {
        let mut effects = Effects::default();
        {
            let mut core = self.lock();
            let was_active = core.transport.is_some()
                || core.state.is_connected()
                || core.state.is_connecting();

            core.cancel_timers();
            core.retire_transport(&mut effects);
            core.settle_pending(&mut effects, false);

            let next = core.state.disconnected();
            core.transition(next);

            if was_active {
                #[cfg(feature = "tracing")]
                info!(link = %self.config.name, reason = ?reason, "disconnected");

                #[cfg(feature = "metrics")]
                {
                    counter!(
                        "realtime_link_disconnects_total",
                        "link" => self.config.name.clone(),
                        "reason" => reason.label()
                    )
                    .increment(1);
                    gauge!("realtime_link_connected", "link" => self.config.name.clone()).set(0.0);
                }

                effects
                    .events
                    .push(ConnectionEvent::disconnected(self.name(), reason));
            }
        }
        self.apply(effects);
    }

    fn listener_added(&self) {
        #[cfg(feature = "metrics")]
        gauge!("realtime_link_listeners", "link" => self.config.name.clone())
            .set(self.registry.listener_count() as f64);
        self.cancel_idle_teardown();
    }

    pub(crate) fn remove_listener(self: &Arc<Self>, key: &SubscriptionKey) {
        let Some(_remaining) = self.registry.remove(key) else {
            return;
        };

        #[cfg(feature = "metrics")]
        gauge!("realtime_link_listeners", "link" => self.config.name.clone())
            .set(_remaining as f64);

        if self.registry.is_idle() {
            self.arm_idle_teardown();
        }
    }

    pub(crate) fn release_lease(self: &Arc<Self>) {
        self.registry.release_lease();
        if self.registry.is_idle() {
            self.arm_idle_teardown();
        }
    }

    fn cancel_idle_teardown(&self) {
        self.lock().idle_timer.cancel();
    }

    fn arm_idle_teardown(self: &Arc<Self>) {
        let mut core = self.lock();
        let id = core.next_timer_id();
        let weak = Arc::downgrade(self);
        core.idle_timer.arm(
            id,
            timer::spawn_after(self.config.idle_teardown_delay, move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_idle_timer(id);
                }
            }),
        );

        #[cfg(feature = "tracing")]
        debug!(
            link = %self.config.name,
            delay = ?self.config.idle_teardown_delay,
            "no subscribers left; idle teardown armed"
        );
    }

    fn on_idle_timer(self: &Arc<Self>, id: u64) {
        {
            let mut core = self.lock();
            if !core.idle_timer.fire(id) || !self.registry.is_idle() {
                return;
            }
        }

        #[cfg(feature = "tracing")]
        info!(link = %self.config.name, "idle teardown");

        self.config
            .event_listeners
            .emit(&ConnectionEvent::idle_teardown(self.name()));
        self.teardown(DisconnectReason::IdleTeardown);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let core = self.core.get_mut().unwrap_or_else(PoisonError::into_inner);
        core.cancel_timers();
        if let Some(transport) = core.transport.take() {
            transport.retire().close();
        }
    }
}
