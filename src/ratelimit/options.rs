//! Limiter configuration and decision types shared by every algorithm.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::{RatekeeperError, Result};

/// Validated limits for a rate limiter.
///
/// Both the window and the request budget are guaranteed to be non-zero,
/// which keeps window ids and leak rates well defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterOptions {
    window_size_ms: u64,
    max_requests: u64,
    max_keys: Option<NonZeroUsize>,
}

impl LimiterOptions {
    /// Create options admitting `max_requests` per `window_size_ms`.
    pub fn new(window_size_ms: u64, max_requests: u64) -> Result<Self> {
        if window_size_ms == 0 {
            return Err(RatekeeperError::InvalidLimit(
                "window_size_ms must be greater than 0".to_string(),
            ));
        }
        if max_requests == 0 {
            return Err(RatekeeperError::InvalidLimit(
                "max_requests must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            window_size_ms,
            max_requests,
            max_keys: None,
        })
    }

    /// Bound the number of tracked keys, evicting the least recently used.
    pub fn with_max_keys(mut self, max_keys: NonZeroUsize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    /// Length of the measurement window in milliseconds.
    pub fn window_size_ms(&self) -> u64 {
        self.window_size_ms
    }

    /// Requests admitted per window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Upper bound on tracked keys, if any.
    pub fn max_keys(&self) -> Option<NonZeroUsize> {
        self.max_keys
    }
}

/// The outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Estimate of further requests admissible in the current period
    pub remaining: u64,
    /// Epoch milliseconds at which `remaining` is next expected to grow
    pub reset_time: u64,
}

impl Decision {
    /// An admitted request.
    pub fn allow(remaining: u64, reset_time: u64) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_time,
        }
    }

    /// A rejected request. Nothing remains in the current period.
    pub fn reject(reset_time: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_time,
        }
    }
}
