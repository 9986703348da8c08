//! Property tests for reconnect backoff.
//!
//! Invariants tested:
//! - Exponential delay equals min(base * 2^n, cap)
//! - Delays never decrease and never exceed the cap
//! - Jittered delays stay within the randomization band

use proptest::prelude::*;
use realtime_link::{ExponentialRandomBackoff, IntervalFunction, ReconnectPolicy};
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: delay is base doubled per attempt, then capped
    #[test]
    fn exponential_matches_closed_form(
        base_ms in 1u64..=5_000,
        cap_ms in 1u64..=120_000,
        attempt in 0usize..=40,
    ) {
        let policy = ReconnectPolicy::exponential(
            Duration::from_millis(base_ms),
            Duration::from_millis(cap_ms),
        );
        let delay = policy.delay_for_attempt(attempt).unwrap();

        let expected = (base_ms as f64 * 2f64.powi(attempt as i32)).min(cap_ms as f64);
        let diff = (delay.as_secs_f64() * 1_000.0 - expected).abs();
        prop_assert!(diff < 1.0, "attempt {attempt}: got {delay:?}, expected {expected}ms");
    }

    /// Property: the schedule is monotonic and bounded by the cap
    #[test]
    fn exponential_is_monotonic_and_capped(
        base_ms in 1u64..=5_000,
        cap_ms in 1u64..=120_000,
    ) {
        let cap = Duration::from_millis(cap_ms);
        let policy = ReconnectPolicy::exponential(Duration::from_millis(base_ms), cap);

        let mut previous = Duration::ZERO;
        for attempt in 0..64 {
            let delay = policy.delay_for_attempt(attempt).unwrap();
            prop_assert!(delay >= previous);
            prop_assert!(delay <= cap);
            previous = delay;
        }
    }

    /// Property: jitter stays within base * (1 +/- factor)
    #[test]
    fn jitter_stays_in_band(
        base_ms in 100u64..=5_000,
        factor in 0.0f64..=1.0,
        attempt in 0usize..=4,
    ) {
        let backoff = ExponentialRandomBackoff::new(Duration::from_millis(base_ms), factor);
        let nominal = base_ms as f64 * 2f64.powi(attempt as i32);

        for _ in 0..20 {
            let delay = backoff.next_interval(attempt).as_secs_f64() * 1_000.0;
            prop_assert!(delay >= nominal * (1.0 - factor) - 1.0);
            prop_assert!(delay <= nominal * (1.0 + factor) + 1.0);
        }
    }
}
