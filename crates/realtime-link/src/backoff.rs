//! Backoff interval functions used by [`ReconnectPolicy`](crate::ReconnectPolicy).

use std::time::Duration;

/// Abstraction for computing reconnect delays.
pub trait IntervalFunction: Send + Sync {
    /// Computes the delay before the next reconnect.
    ///
    /// `attempt` is the number of reconnects already made, so the first
    /// reconnect after a drop asks for attempt 0.
    fn next_interval(&self, attempt: usize) -> Duration;
}

/// The same delay for every attempt.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    /// Creates a fixed interval backoff.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// `initial * multiplier^attempt`, optionally capped.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    /// Creates an exponential backoff doubling on each attempt.
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    /// Sets the growth factor.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Caps the delay.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }

    /// Spreads every delay by up to `randomization_factor` of itself.
    pub fn randomized(self, randomization_factor: f64) -> ExponentialRandomBackoff {
        ExponentialRandomBackoff {
            nominal: self,
            randomization_factor: randomization_factor.clamp(0.0, 1.0),
        }
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        grow(
            self.initial_interval,
            self.multiplier,
            attempt,
            self.max_interval,
        )
    }
}

/// Exponential backoff with jitter so that many clients dropped by the
/// same server restart do not all come back at once.
///
/// The nominal delay follows [`ExponentialBackoff`]; each value is then
/// moved by up to `randomization_factor` of itself in either direction.
#[derive(Debug, Clone)]
pub struct ExponentialRandomBackoff {
    nominal: ExponentialBackoff,
    randomization_factor: f64,
}

impl ExponentialRandomBackoff {
    /// Creates a randomized exponential backoff.
    ///
    /// A `randomization_factor` of 0.5 spreads each delay between 50% and
    /// 150% of the exponential value. The factor is clamped to `0.0..=1.0`.
    pub fn new(initial_interval: Duration, randomization_factor: f64) -> Self {
        ExponentialBackoff::new(initial_interval).randomized(randomization_factor)
    }

    /// Sets the growth factor.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.nominal = self.nominal.multiplier(multiplier);
        self
    }

    /// Caps the delay before randomization.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.nominal = self.nominal.max_interval(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        jitter(self.nominal.next_interval(attempt), self.randomization_factor)
    }
}

/// Function-based interval.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    /// Creates a new function-based interval.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}

fn jitter(duration: Duration, factor: f64) -> Duration {
    use rand::Rng;

    let secs = duration.as_secs_f64();
    let delta = secs * factor;
    if delta == 0.0 {
        return duration;
    }
    let spread = rand::rng().random_range((secs - delta)..=(secs + delta));
    Duration::try_from_secs_f64(spread.max(0.0)).unwrap_or(Duration::MAX)
}

// Saturates instead of panicking once the exponent outgrows `Duration`.
fn grow(initial: Duration, multiplier: f64, attempt: usize, max: Option<Duration>) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let secs = initial.as_secs_f64() * multiplier.powi(exponent);
    let interval = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
    match max {
        Some(max) => interval.min(max),
        None => interval,
    }
}
