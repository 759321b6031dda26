//! Behaviour shared by every algorithm, exercised through the common trait.

use std::num::NonZeroUsize;

use ratekeeper::{Algorithm, LimiterOptions, ManualClock, RateLimiter};

fn build(algorithm: Algorithm, window: u64, max: u64) -> (Box<dyn RateLimiter>, ManualClock) {
    let clock = ManualClock::new(0);
    let options = LimiterOptions::new(window, max).unwrap();
    (algorithm.build(options, clock.clone()), clock)
}

fn count_admitted(limiter: &dyn RateLimiter, key: &str, calls: usize) -> usize {
    (0..calls).filter(|_| limiter.allow(key).allowed).count()
}

#[test]
fn test_first_max_requests_admitted_then_rejected() {
    for algorithm in Algorithm::ALL {
        let (limiter, _clock) = build(algorithm, 1000, 5);

        let mut previous = u64::MAX;
        for i in 0..5 {
            let decision = limiter.allow("user1");
            assert!(decision.allowed, "{} request {} should pass", algorithm, i);
            assert!(
                decision.remaining < previous,
                "{} remaining must fall",
                algorithm
            );
            previous = decision.remaining;
        }
        assert_eq!(previous, 0, "{} should be exhausted", algorithm);

        let decision = limiter.allow("user1");
        assert!(
            !decision.allowed,
            "{} should reject the sixth request",
            algorithm
        );
        assert_eq!(decision.remaining, 0);
    }
}

#[test]
fn test_fixed_window_scenario() {
    let (limiter, clock) = build(Algorithm::FixedWindow, 1000, 5);

    for _ in 0..5 {
        assert!(limiter.allow("user1").allowed);
    }
    assert!(!limiter.allow("user1").allowed);

    clock.set(1001);
    let decision = limiter.allow("user1");
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 4);
}

#[test]
fn test_fixed_window_boundary_burst() {
    let (limiter, clock) = build(Algorithm::FixedWindow, 1000, 5);

    clock.set(999);
    let before = (0..5).filter(|_| limiter.allow("user1").allowed).count();
    clock.set(1000);
    let after = (0..5).filter(|_| limiter.allow("user1").allowed).count();

    assert_eq!(before + after, 10);
}

#[test]
fn test_leaky_bucket_scenario() {
    let (limiter, clock) = build(Algorithm::LeakyBucket, 1000, 10);

    for expected in (0..10).rev() {
        let decision = limiter.allow("user1");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, expected);
    }

    let decision = limiter.allow("user1");
    assert!(!decision.allowed);
    assert_eq!(decision.reset_time, 100);

    clock.advance(500);
    let decision = limiter.allow("user1");
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 4);
}

#[test]
fn test_sliding_window_counter_scenario() {
    let (limiter, clock) = build(Algorithm::SlidingWindowCounter, 1000, 10);

    for _ in 0..10 {
        assert!(limiter.allow("user1").allowed);
    }

    clock.set(1500);
    let decision = limiter.allow("user1");
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 4);
}

#[test]
fn test_sliding_window_log_scenario() {
    let (limiter, clock) = build(Algorithm::SlidingWindowLog, 1000, 3);

    for _ in 0..3 {
        assert!(limiter.allow("user1").allowed);
    }
    assert!(!limiter.allow("user1").allowed);

    clock.set(600);
    assert!(!limiter.allow("user1").allowed);

    clock.set(1100);
    let decision = limiter.allow("user1");
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 2);
}

#[test]
fn test_rejections_do_not_consume_capacity() {
    // Hammering a full limiter must not delay recovery.
    for algorithm in Algorithm::ALL {
        let (hammered, clock) = build(algorithm, 1000, 4);
        let (idle, idle_clock) = build(algorithm, 1000, 4);

        for _ in 0..4 {
            hammered.allow("user1");
            idle.allow("user1");
        }
        for _ in 0..50 {
            assert!(!hammered.allow("user1").allowed);
        }

        clock.set(1500);
        idle_clock.set(1500);
        assert_eq!(
            hammered.allow("user1"),
            idle.allow("user1"),
            "{} diverged after rejections",
            algorithm
        );
    }
}

#[test]
fn test_keys_are_isolated() {
    for algorithm in Algorithm::ALL {
        let (limiter, _clock) = build(algorithm, 1000, 2);

        limiter.allow("alice");
        limiter.allow("alice");
        assert!(!limiter.allow("alice").allowed);

        for key in ["bob", "", "alice "] {
            let decision = limiter.allow(key);
            assert!(
                decision.allowed,
                "{} leaked state into {:?}",
                algorithm,
                key
            );
            assert_eq!(decision.remaining, 1);
        }

        assert_eq!(limiter.tracked_keys(), 4);
    }
}

#[test]
fn test_bounded_key_store_forgets_oldest_key() {
    for algorithm in Algorithm::ALL {
        let clock = ManualClock::new(0);
        let options = LimiterOptions::new(1000, 1)
            .unwrap()
            .with_max_keys(NonZeroUsize::new(2).unwrap());
        let limiter = algorithm.build(options, clock);

        assert!(limiter.allow("a").allowed);
        assert!(limiter.allow("b").allowed);
        assert!(!limiter.allow("a").allowed);
        // "b" is now least recently used and gets evicted
        assert!(limiter.allow("c").allowed);
        assert_eq!(limiter.tracked_keys(), 2);

        assert!(!limiter.allow("a").allowed, "{} lost a live key", algorithm);
        assert!(
            limiter.allow("b").allowed,
            "{} kept an evicted key",
            algorithm
        );
    }
}

#[test]
fn test_concurrent_callers_never_over_admit() {
    for algorithm in Algorithm::ALL {
        let (limiter, _clock) = build(algorithm, 60_000, 100);
        let limiter = limiter.as_ref();

        let admitted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(move || count_admitted(limiter, "shared", 50)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(admitted, 100, "{} over- or under-admitted", algorithm);
    }
}
