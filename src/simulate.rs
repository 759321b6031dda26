//! Synthetic traffic for comparing algorithms side by side.
//!
//! The same random arrivals are fed to every algorithm, and each report counts
//! what was admitted plus the densest burst any single key got through within
//! one window. That last number is where the algorithms differ: a fixed window
//! can let through up to twice its budget across a boundary, the log never more
//! than its budget.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{RatekeeperError, Result};
use crate::ratelimit::{Algorithm, LimiterOptions, ManualClock};

/// Shape of the generated traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationParams {
    /// Number of distinct callers
    pub keys: usize,
    /// Total requests across all callers
    pub requests: usize,
    /// Arrivals are spread uniformly over `[0, duration_ms)`
    pub duration_ms: u64,
    /// RNG seed, so runs are reproducible
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            keys: 10,
            requests: 10_000,
            duration_ms: 60_000,
            seed: 42,
        }
    }
}

/// Outcome of running one algorithm over the simulated traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlgorithmReport {
    /// Algorithm this report covers
    pub algorithm: Algorithm,
    /// Requests allowed across all keys
    pub admitted: u64,
    /// Requests turned away across all keys
    pub rejected: u64,
    /// Most requests admitted for one key within any span shorter than the window
    pub peak_in_window: usize,
}

/// Generate arrivals ordered by time.
pub fn generate_arrivals(params: &SimulationParams) -> Result<Vec<(u64, String)>> {
    if params.keys == 0 {
        return Err(RatekeeperError::Config(
            "keys must be greater than 0".to_string(),
        ));
    }
    if params.duration_ms == 0 {
        return Err(RatekeeperError::Config(
            "duration_ms must be greater than 0".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut arrivals: Vec<(u64, String)> = (0..params.requests)
        .map(|_| {
            let timestamp = rng.gen_range(0..params.duration_ms);
            let client = rng.gen_range(0..params.keys);
            (timestamp, format!("client-{}", client))
        })
        .collect();
    arrivals.sort_by_key(|(timestamp, _)| *timestamp);

    Ok(arrivals)
}

/// Run every algorithm over the same generated traffic.
pub fn simulate(
    params: &SimulationParams,
    options: LimiterOptions,
) -> Result<Vec<AlgorithmReport>> {
    let arrivals = generate_arrivals(params)?;
    debug!(
        requests = arrivals.len(),
        keys = params.keys,
        seed = params.seed,
        "Generated arrivals"
    );

    let reports = Algorithm::ALL
        .into_iter()
        .map(|algorithm| run_algorithm(algorithm, options, &arrivals))
        .collect();

    Ok(reports)
}

fn run_algorithm(
    algorithm: Algorithm,
    options: LimiterOptions,
    arrivals: &[(u64, String)],
) -> AlgorithmReport {
    let clock = ManualClock::new(0);
    let limiter = algorithm.build(options, clock.clone());

    let mut admitted_at: HashMap<&str, Vec<u64>> = HashMap::new();
    let mut rejected: u64 = 0;

    for (timestamp, key) in arrivals {
        clock.set(*timestamp);
        if limiter.allow(key).allowed {
            admitted_at
                .entry(key.as_str())
                .or_default()
                .push(*timestamp);
        } else {
            rejected += 1;
        }
    }

    let admitted: u64 = admitted_at.values().map(|t| t.len() as u64).sum();
    let peak_in_window = admitted_at
        .values()
        .map(|timestamps| peak_within(timestamps, options.window_size_ms()))
        .max()
        .unwrap_or(0);

    info!(
        algorithm = %algorithm,
        admitted,
        rejected,
        peak_in_window,
        "Simulation finished"
    );

    AlgorithmReport {
        algorithm,
        admitted,
        rejected,
        peak_in_window,
    }
}

/// Largest number of sorted `timestamps` falling in any span `[t, t + window)`.
fn peak_within(timestamps: &[u64], window_ms: u64) -> usize {
    let mut peak = 0;
    let mut start = 0;

    for (end, &timestamp) in timestamps.iter().enumerate() {
        while timestamp - timestamps[start] >= window_ms {
            start += 1;
        }
        peak = peak.max(end - start + 1);
    }

    peak
}
