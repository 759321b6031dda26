//! Leaky bucket.

use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::limiter::{Algorithm, RateLimiter};
use super::options::{Decision, LimiterOptions};
use super::store::KeyStore;

/// Fill level of one key's bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BucketLevel {
    /// Outstanding requests, drained continuously
    level: f64,
    /// When the level was last brought up to date
    last_time: u64,
}

/// A bucket holding up to `max_requests` that drains at
/// `max_requests / window_size_ms` per millisecond.
///
/// Each admitted request adds one unit to the bucket; a request that would
/// push the level above capacity is rejected. The level is fractional, so
/// capacity frees up smoothly rather than at window boundaries.
pub struct LeakyBucket<C: Clock = SystemClock> {
    options: LimiterOptions,
    clock: C,
    buckets: KeyStore<BucketLevel>,
}

impl LeakyBucket {
    /// Create a bucket reading the system clock.
    pub fn new(options: LimiterOptions) -> Self {
        Self::with_clock(options, SystemClock)
    }
}

impl<C: Clock> LeakyBucket<C> {
    /// Create a bucket reading time from `clock`.
    pub fn with_clock(options: LimiterOptions, clock: C) -> Self {
        Self {
            options,
            clock,
            buckets: KeyStore::new(options.max_keys()),
        }
    }

    /// Requests drained per millisecond.
    pub fn leak_rate(&self) -> f64 {
        self.options.max_requests() as f64 / self.options.window_size_ms() as f64
    }

    /// Check and record a request for `key` at `now_ms`.
    pub fn allow_at(&self, key: &str, now_ms: u64) -> Decision {
        let capacity = self.options.max_requests() as f64;

        let decision = self.buckets.with_entry(
            key,
            || {
                debug!(key = %key, "Creating leaky bucket");
                BucketLevel {
                    level: 0.0,
                    last_time: now_ms,
                }
            },
            |bucket| {
                let elapsed = now_ms.saturating_sub(bucket.last_time);
                bucket.level = (bucket.level - self.leaked_over(elapsed)).max(0.0);
                // A clock that steps backwards must not leak the same span twice.
                bucket.last_time = bucket.last_time.max(now_ms);

                if bucket.level + 1.0 <= capacity {
                    bucket.level += 1.0;
                    Decision::allow(
                        (capacity - bucket.level).floor() as u64,
                        now_ms.saturating_add(self.drain_ms(bucket.level)),
                    )
                } else {
                    let overflow = bucket.level + 1.0 - capacity;
                    Decision::reject(now_ms.saturating_add(self.drain_ms(overflow)))
                }
            },
        );

        if !decision.allowed {
            debug!(key = %key, reset_time = decision.reset_time, "Leaky bucket full");
        }
        trace!(key = %key, now_ms, ?decision, "Leaky bucket decision");

        decision
    }

    /// Current (last computed) fill level for `key`.
    pub fn level(&self, key: &str) -> Option<f64> {
        self.buckets.peek(key, |bucket| bucket.level)
    }

    /// Units drained over `elapsed_ms`.
    fn leaked_over(&self, elapsed_ms: u64) -> f64 {
        // Multiply before dividing so whole-unit leaks stay exact.
        elapsed_ms as f64 * self.options.max_requests() as f64
            / self.options.window_size_ms() as f64
    }

    /// Milliseconds needed to drain `units`, rounded up.
    fn drain_ms(&self, units: f64) -> u64 {
        (units * self.options.window_size_ms() as f64 / self.options.max_requests() as f64).ceil()
            as u64
    }
}

impl<C: Clock> RateLimiter for LeakyBucket<C> {
    fn allow(&self, key: &str) -> Decision {
        self.allow_at(key, self.clock.now_ms())
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::LeakyBucket
    }

    fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::ManualClock;

    fn test_bucket() -> (LeakyBucket<ManualClock>, ManualClock) {
        let clock = ManualClock::new(0);
        let options = LimiterOptions::new(1000, 10).unwrap();
        (LeakyBucket::with_clock(options, clock.clone()), clock)
    }

    #[test]
    fn test_leak_rate() {
        let (bucket, _clock) = test_bucket();
        assert!((bucket.leak_rate() - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn test_admits_up_to_capacity() {
        let (bucket, _clock) = test_bucket();

        for i in 0..10 {
            let decision = bucket.allow("user1");
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 9 - i);
            // Time for the bucket to drain completely
            assert_eq!(decision.reset_time, (i + 1) * 100);
        }
    }

    #[test]
    fn test_full_bucket_rejects_with_time_to_one_slot() {
        let (bucket, _clock) = test_bucket();

        for _ in 0..10 {
            bucket.allow("user1");
        }

        let decision = bucket.allow("user1");
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_time, 100);
    }

    #[test]
    fn test_leaks_over_time() {
        let (bucket, clock) = test_bucket();

        for _ in 0..10 {
            bucket.allow("user1");
        }

        clock.advance(500);
        let decision = bucket.allow("user1");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
    }

    #[test]
    fn test_constant_rate_rejects_sustained_burst() {
        let (bucket, clock) = test_bucket();

        for _ in 0..10 {
            bucket.allow("user1");
        }

        clock.advance(100);
        assert!(bucket.allow("user1").allowed);
        assert!(!bucket.allow("user1").allowed);
    }

    #[test]
    fn test_rejection_persists_only_the_decay() {
        let (bucket, clock) = test_bucket();

        for _ in 0..10 {
            bucket.allow("user1");
        }

        clock.advance(50);
        let decision = bucket.allow("user1");
        assert!(!decision.allowed);
        assert_eq!(bucket.level("user1"), Some(9.5));
        // Half a unit still has to drain before one more fits
        assert_eq!(decision.reset_time, 100);
    }

    #[test]
    fn test_level_never_goes_negative() {
        let (bucket, clock) = test_bucket();

        bucket.allow("user1");
        clock.advance(60_000);

        let decision = bucket.allow("user1");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 9);
        assert_eq!(bucket.level("user1"), Some(1.0));
    }

    #[test]
    fn test_fractional_reset_rounds_up() {
        let clock = ManualClock::new(0);
        let options = LimiterOptions::new(1000, 3).unwrap();
        let bucket = LeakyBucket::with_clock(options, clock.clone());

        let decision = bucket.allow("user1");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);
        // 1000 / 3 = 333.33.. ms to drain one unit
        assert_eq!(decision.reset_time, 334);
    }
}
