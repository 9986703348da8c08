use std::sync::Arc;
use std::time::Duration;

use realtime_link_core::{EventListeners, FnListener};

use crate::error::{default_classifier, ConfigError, ErrorClass, ErrorClassifier, TransportError};
use crate::events::ConnectionEvent;
use crate::policy::ReconnectPolicy;

const DEFAULT_NAME: &str = "<unnamed>";

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager).
///
/// Supplied once at construction.
pub struct ConnectionConfig {
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) auth_token: Option<String>,
    pub(crate) policy: ReconnectPolicy,
    /// None means unlimited attempts.
    pub(crate) max_reconnect_attempts: Option<u32>,
    pub(crate) connect_timeout: Duration,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) stale_probe_threshold: Duration,
    pub(crate) stale_force_close_threshold: Duration,
    pub(crate) idle_teardown_delay: Duration,
    pub(crate) probe_event: String,
    pub(crate) liveness_events: Vec<String>,
    pub(crate) error_classifier: ErrorClassifier,
    pub(crate) event_listeners: EventListeners<ConnectionEvent>,
}

impl Clone for ConnectionConfig {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            url: self.url.clone(),
            auth_token: self.auth_token.clone(),
            policy: self.policy.clone(),
            max_reconnect_attempts: self.max_reconnect_attempts,
            connect_timeout: self.connect_timeout,
            heartbeat_interval: self.heartbeat_interval,
            stale_probe_threshold: self.stale_probe_threshold,
            stale_force_close_threshold: self.stale_force_close_threshold,
            idle_teardown_delay: self.idle_teardown_delay,
            probe_event: self.probe_event.clone(),
            liveness_events: self.liveness_events.clone(),
            error_classifier: Arc::clone(&self.error_classifier),
            event_listeners: self.event_listeners.clone(),
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("policy", &self.policy)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("connect_timeout", &self.connect_timeout)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("stale_probe_threshold", &self.stale_probe_threshold)
            .field(
                "stale_force_close_threshold",
                &self.stale_force_close_threshold,
            )
            .field("idle_teardown_delay", &self.idle_teardown_delay)
            .field("probe_event", &self.probe_event)
            .field("liveness_events", &self.liveness_events)
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}

impl ConnectionConfig {
    /// Creates a new builder with the default timings.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Instance label used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns true if a credential is configured.
    pub fn has_auth_token(&self) -> bool {
        self.auth_token.is_some()
    }

    /// Returns the reconnection policy.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Returns the maximum number of automatic reconnects.
    pub fn max_reconnect_attempts(&self) -> Option<u32> {
        self.max_reconnect_attempts
    }

    /// How long an attempt may take to open.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Heartbeat tick period.
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Silence after which a probe is sent.
    pub fn stale_probe_threshold(&self) -> Duration {
        self.stale_probe_threshold
    }

    /// Silence after which the transport is force-closed.
    pub fn stale_force_close_threshold(&self) -> Duration {
        self.stale_force_close_threshold
    }

    /// Delay between the last subscriber leaving and teardown.
    pub fn idle_teardown_delay(&self) -> Duration {
        self.idle_teardown_delay
    }

    /// Name of the liveness probe message.
    pub fn probe_event(&self) -> &str {
        &self.probe_event
    }

    /// Inbound message names that count as activity.
    pub fn liveness_events(&self) -> &[String] {
        &self.liveness_events
    }

    /// Classifies a transport error with the configured classifier.
    pub fn classify(&self, error: &TransportError) -> ErrorClass {
        (self.error_classifier)(error)
    }

    pub(crate) fn is_liveness_event(&self, event: &str) -> bool {
        self.liveness_events.iter().any(|name| name == event)
    }
}

/// Builder for constructing a [`ConnectionConfig`].
pub struct ConnectionConfigBuilder {
    name: String,
    url: String,
    auth_token: Option<String>,
    policy: ReconnectPolicy,
    max_reconnect_attempts: Option<u32>,
    connect_timeout: Duration,
    heartbeat_interval: Duration,
    stale_probe_threshold: Duration,
    stale_force_close_threshold: Duration,
    idle_teardown_delay: Duration,
    probe_event: String,
    liveness_events: Vec<String>,
    error_classifier: ErrorClassifier,
    event_listeners: EventListeners<ConnectionEvent>,
}

impl std::fmt::Debug for ConnectionConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfigBuilder")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("policy", &self.policy)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .finish_non_exhaustive()
    }
}

impl ConnectionConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instance label used in events, logs and metrics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the server URL. Required.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the credential presented on every attempt.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the reconnection policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use realtime_link::{ConnectionConfig, ReconnectPolicy};
    ///
    /// let config = ConnectionConfig::builder()
    ///     .url("wss://example.test/socket")
    ///     .reconnect_policy(ReconnectPolicy::fixed(Duration::from_secs(1)))
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses `min(base * 2^attempt, cap)` between reconnects.
    ///
    /// Default is 2 seconds doubling up to 30 seconds.
    pub fn reconnect_backoff(self, base: Duration, cap: Duration) -> Self {
        self.reconnect_policy(ReconnectPolicy::exponential(base, cap))
    }

    /// Sets the maximum number of automatic reconnects. Default is 2.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Never stops reconnecting automatically.
    pub fn unlimited_reconnect_attempts(mut self) -> Self {
        self.max_reconnect_attempts = None;
        self
    }

    /// Sets how long an attempt may take to open. Default is 15 seconds.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the heartbeat tick period. Default is 30 seconds.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the silence after which a probe is sent. Default is 60 seconds.
    pub fn stale_probe_threshold(mut self, threshold: Duration) -> Self {
        self.stale_probe_threshold = threshold;
        self
    }

    /// Sets the silence after which the transport is force-closed.
    /// Default is 120 seconds.
    pub fn stale_force_close_threshold(mut self, threshold: Duration) -> Self {
        self.stale_force_close_threshold = threshold;
        self
    }

    /// Sets the idle-teardown delay. Default is 60 seconds.
    pub fn idle_teardown_delay(mut self, delay: Duration) -> Self {
        self.idle_teardown_delay = delay;
        self
    }

    /// Sets the probe message name. Default is `"ping"`.
    pub fn probe_event(mut self, event: impl Into<String>) -> Self {
        self.probe_event = event.into();
        self
    }

    /// Sets the inbound message names that count as activity.
    /// Default is `["pong"]`.
    pub fn liveness_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.liveness_events = events.into_iter().map(Into::into).collect();
        self
    }

    /// Sets how transport errors are classified.
    ///
    /// # Examples
    ///
    /// ```
    /// use realtime_link::{ConnectionConfig, ErrorClass, TransportError};
    ///
    /// let config = ConnectionConfig::builder()
    ///     .url("wss://example.test/socket")
    ///     .error_classifier(|error| match error {
    ///         TransportError::Unauthorized(_) => ErrorClass::Authentication,
    ///         _ => ErrorClass::Retryable,
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn error_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&TransportError) -> ErrorClass + Send + Sync + 'static,
    {
        self.error_classifier = Arc::new(classifier);
        self
    }

    /// Registers a callback for lifecycle events.
    ///
    /// # Examples
    ///
    /// ```
    /// use realtime_link::{ConnectionConfig, ConnectionEvent};
    ///
    /// let config = ConnectionConfig::builder()
    ///     .url("wss://example.test/socket")
    ///     .on_event(|event| {
    ///         if let ConnectionEvent::ReconnectScheduled { attempt, delay, .. } = event {
    ///             println!("reconnect #{attempt} in {delay:?}");
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Builds the [`ConnectionConfig`].
    pub fn build(self) -> Result<ConnectionConfig, ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl);
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::ZeroHeartbeatInterval);
        }
        if self.stale_force_close_threshold <= self.stale_probe_threshold {
            return Err(ConfigError::InvalidStaleThresholds {
                probe: self.stale_probe_threshold,
                force_close: self.stale_force_close_threshold,
            });
        }

        Ok(ConnectionConfig {
            name: self.name,
            url: self.url,
            auth_token: self.auth_token,
            policy: self.policy,
            max_reconnect_attempts: self.max_reconnect_attempts,
            connect_timeout: self.connect_timeout,
            heartbeat_interval: self.heartbeat_interval,
            stale_probe_threshold: self.stale_probe_threshold,
            stale_force_close_threshold: self.stale_force_close_threshold,
            idle_teardown_delay: self.idle_teardown_delay,
            probe_event: self.probe_event,
            liveness_events: self.liveness_events,
            error_classifier: self.error_classifier,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for ConnectionConfigBuilder {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            url: String::new(),
            auth_token: None,
            policy: ReconnectPolicy::default(),
            max_reconnect_attempts: Some(2),
            connect_timeout: Duration::from_secs(15),
            heartbeat_interval: Duration::from_secs(30),
            stale_probe_threshold: Duration::from_secs(60),
            stale_force_close_threshold: Duration::from_secs(120),
            idle_teardown_delay: Duration::from_secs(60),
            probe_event: "ping".to_string(),
            liveness_events: vec!["pong".to_string()],
            error_classifier: Arc::new(default_classifier),
            event_listeners: EventListeners::new(),
        }
    }
}
