//! When to try again after the connection drops.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, IntervalFunction,
};

/// The first automatic reconnect waits this long.
const DEFAULT_BASE: Duration = Duration::from_secs(2);
/// No automatic reconnect waits longer.
const DEFAULT_CAP: Duration = Duration::from_secs(30);

/// How long to wait before each automatic reconnect.
///
/// The manager asks once per lost connection, passing the number of
/// reconnects already made. How many it asks for at most is set by
/// [`max_reconnect_attempts`](crate::ConnectionConfigBuilder::max_reconnect_attempts).
#[derive(Clone)]
pub enum ReconnectPolicy {
    /// Leave reconnecting to the caller.
    None,
    /// The same pause before every reconnect.
    Fixed(FixedInterval),
    /// A pause that doubles per reconnect, up to a cap.
    Exponential(ExponentialBackoff),
    /// Like `Exponential`, with each pause spread around its nominal value.
    ExponentialRandom(ExponentialRandomBackoff),
    /// Any other schedule.
    Custom(Arc<dyn IntervalFunction>),
}

impl ReconnectPolicy {
    pub fn none() -> Self {
        Self::None
    }

    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed(FixedInterval::new(delay))
    }

    /// `min(base * 2^attempt, cap)`.
    pub fn exponential(base: Duration, cap: Duration) -> Self {
        Self::Exponential(doubling(base, cap))
    }

    /// [`exponential`](Self::exponential), with every delay moved by up to
    /// `randomization_factor` (0.0 to 1.0) of itself.
    pub fn exponential_random(base: Duration, cap: Duration, randomization_factor: f64) -> Self {
        Self::ExponentialRandom(doubling(base, cap).randomized(randomization_factor))
    }

    pub fn custom<I: IntervalFunction + 'static>(interval: I) -> Self {
        Self::Custom(Arc::new(interval))
    }

    /// Delay before reconnect number `attempt + 1`, or `None` when the
    /// policy never reconnects.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        self.schedule()
            .map(|schedule| schedule.next_interval(attempt))
    }

    fn schedule(&self) -> Option<&dyn IntervalFunction> {
        match self {
            Self::None => None,
            Self::Fixed(interval) => Some(interval),
            Self::Exponential(backoff) => Some(backoff),
            Self::ExponentialRandom(backoff) => Some(backoff),
            Self::Custom(schedule) => Some(schedule.as_ref()),
        }
    }
}

fn doubling(base: Duration, cap: Duration) -> ExponentialBackoff {
    ExponentialBackoff::new(base).max_interval(cap)
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::exponential(DEFAULT_BASE, DEFAULT_CAP)
    }
}

impl fmt::Debug for ReconnectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Fixed(interval) => f.debug_tuple("Fixed").field(interval).finish(),
            Self::Exponential(backoff) => f.debug_tuple("Exponential").field(backoff).finish(),
            Self::ExponentialRandom(backoff) => {
                f.debug_tuple("ExponentialRandom").field(backoff).finish()
            }
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
