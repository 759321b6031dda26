//! Replaying request traces through a limiter.
//!
//! A trace is a text stream with one request per line:
//!
//! ```text
//! # timestamp_ms key
//! 0 alice
//! 0 bob
//! 250 alice
//! ```
//!
//! Blank lines and `#` comments are skipped. Timestamps must never decrease.
//! A line holding only a timestamp is a request for the empty key.

use std::io::{BufRead, Write};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{RatekeeperError, Result};
use crate::ratelimit::{Algorithm, Decision, LimiterOptions, ManualClock, RateLimiter};

/// A single request read from a trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// When the request arrived
    pub timestamp_ms: u64,
    /// Caller identity
    pub key: String,
}

impl TraceEntry {
    /// Parse one trace line. Returns `Ok(None)` for blank and comment lines.
    pub fn parse(line: &str, line_number: usize) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (timestamp, key) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        let timestamp_ms = timestamp.parse().map_err(|e| RatekeeperError::Trace {
            line: line_number,
            message: format!("invalid timestamp {:?}: {}", timestamp, e),
        })?;

        Ok(Some(Self {
            timestamp_ms,
            key: key.trim().to_string(),
        }))
    }
}

/// One line of replay output.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayRecord<'a> {
    /// Trace time the request was checked at
    pub timestamp_ms: u64,
    /// Caller identity from the trace
    pub key: &'a str,
    /// Limiter verdict, flattened into the same JSON object
    #[serde(flatten)]
    pub decision: Decision,
}

/// Totals for a finished replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Requests read from the trace, skipping blanks and comments
    pub requests: u64,
    /// Requests the limiter allowed
    pub admitted: u64,
    /// Requests the limiter turned away
    pub rejected: u64,
    /// Keys the limiter still tracks at the end
    pub keys: usize,
}

/// Drives a limiter from a trace, with time taken from the trace itself.
pub struct Replayer {
    clock: ManualClock,
    limiter: Box<dyn RateLimiter>,
}

impl Replayer {
    /// Create a replayer for the given algorithm and limits.
    pub fn new(algorithm: Algorithm, options: LimiterOptions) -> Self {
        let clock = ManualClock::new(0);
        let limiter = algorithm.build(options, clock.clone());
        Self { clock, limiter }
    }

    /// Read every request from `reader`, writing one JSON decision per line to
    /// `writer`.
    pub fn run<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();
        let mut last_timestamp = 0;

        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let Some(entry) = TraceEntry::parse(&line?, line_number)? else {
                continue;
            };

            if entry.timestamp_ms < last_timestamp {
                return Err(RatekeeperError::Trace {
                    line: line_number,
                    message: format!(
                        "timestamp {} is earlier than previous timestamp {}",
                        entry.timestamp_ms, last_timestamp
                    ),
                });
            }
            last_timestamp = entry.timestamp_ms;

            self.clock.set(entry.timestamp_ms);
            let decision = self.limiter.allow(&entry.key);

            summary.requests += 1;
            if decision.allowed {
                summary.admitted += 1;
            } else {
                summary.rejected += 1;
            }

            let record = ReplayRecord {
                timestamp_ms: entry.timestamp_ms,
                key: &entry.key,
                decision,
            };
            serde_json::to_writer(&mut writer, &record).map_err(std::io::Error::from)?;
            writeln!(writer)?;
        }

        writer.flush()?;
        summary.keys = self.limiter.tracked_keys();

        debug!(algorithm = %self.limiter.algorithm(), "Replay finished");
        info!(
            requests = summary.requests,
            admitted = summary.admitted,
            rejected = summary.rejected,
            keys = summary.keys,
            "Replay summary"
        );

        Ok(summary)
    }
}
