//! Retry delay calculation.
//!
//! Exponential base doubling from 0.5s plus a small uniform jitter, with
//! the total capped at [`MAX_BACKOFF_SECS`]. The jitter source is
//! injectable so tests get deterministic delays.

use std::time::Duration;

use rand::Rng;

/// Ceiling on any single backoff delay, in seconds.
pub const MAX_BACKOFF_SECS: f64 = 5.0;

/// Upper bound (exclusive) of the uniform jitter, in seconds.
pub const JITTER_MAX_SECS: f64 = 0.25;

type JitterFn = Box<dyn Fn() -> f64 + Send + Sync>;

/// Computes retry delays for the HTTP retry executor.
pub struct Backoff {
    jitter: JitterFn,
}

impl Backoff {
    /// Backoff with thread-local random jitter in `[0, 0.25)`.
    pub fn new() -> Self {
        Self {
            jitter: Box::new(|| rand::rng().random_range(0.0..JITTER_MAX_SECS)),
        }
    }

    /// Backoff with a fixed jitter source, for tests.
    pub fn with_jitter(jitter: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            jitter: Box::new(jitter),
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    ///
    /// `0.5 * 2^attempt + jitter`, capped at [`MAX_BACKOFF_SECS`].
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = 0.5 * 2.0_f64.powi(attempt.min(30) as i32);
        let secs = (base + (self.jitter)()).min(MAX_BACKOFF_SECS);
        Duration::from_secs_f64(secs)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially_with_zero_jitter() {
        let backoff = Backoff::with_jitter(|| 0.0);
        assert_eq!(backoff.delay(0), Duration::from_secs_f64(0.5));
        assert_eq!(backoff.delay(1), Duration::from_secs_f64(1.0));
        assert_eq!(backoff.delay(2), Duration::from_secs_f64(2.0));
        assert_eq!(backoff.delay(3), Duration::from_secs_f64(4.0));
    }

    #[test]
    fn caps_at_ceiling() {
        let backoff = Backoff::with_jitter(|| JITTER_MAX_SECS - f64::EPSILON);
        for attempt in 4..12 {
            assert_eq!(
                backoff.delay(attempt),
                Duration::from_secs_f64(MAX_BACKOFF_SECS)
            );
        }
    }

    #[test]
    fn stays_within_jitter_envelope() {
        let backoff = Backoff::new();
        for attempt in 0..4 {
            let base = 0.5 * 2.0_f64.powi(attempt as i32);
            let delay = backoff.delay(attempt).as_secs_f64();
            let expected_max = (base + JITTER_MAX_SECS).min(MAX_BACKOFF_SECS);
            assert!(delay >= base.min(MAX_BACKOFF_SECS));
            assert!(delay <= expected_max);
        }
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let backoff = Backoff::with_jitter(|| 0.0);
        assert_eq!(
            backoff.delay(u32::MAX),
            Duration::from_secs_f64(MAX_BACKOFF_SECS)
        );
    }
}
