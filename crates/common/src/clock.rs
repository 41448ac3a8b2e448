//! Clock and timing utilities for bounded subprocess runs.
//!
//! - `Deadline`: a wall-clock budget anchored at creation
//! - `StallWatch`: detects a progress value that stopped advancing
//! - millisecond/second conversions and timestamp formatting

use std::time::{Duration, Instant};

/// A wall-clock budget measured from a fixed start instant.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    /// Start a budget of `limit` anchored to now.
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    /// Time elapsed since the budget started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before expiry (zero once expired).
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started.elapsed())
    }

    /// Whether the budget has been exceeded.
    pub fn expired(&self) -> bool {
        self.started.elapsed() > self.limit
    }
}

/// Tracks the last time a monotonically reported value advanced.
///
/// `check` returns true once per stall window so callers can log a warning
/// without flooding.
#[derive(Debug)]
pub struct StallWatch {
    threshold: Duration,
    last_value: u64,
    last_advance: Instant,
}

impl StallWatch {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_value: 0,
            last_advance: Instant::now(),
        }
    }

    /// Record an observed value; resets the stall timer if it advanced.
    pub fn observe(&mut self, value: u64) {
        if value > self.last_value {
            self.last_value = value;
            self.last_advance = Instant::now();
        }
    }

    /// True if no advancement happened for the threshold. Re-arms the timer.
    pub fn check(&mut self) -> bool {
        if self.last_advance.elapsed() >= self.threshold {
            self.last_advance = Instant::now();
            return true;
        }
        false
    }

    /// Last value that counted as an advance.
    pub fn last_value(&self) -> u64 {
        self.last_value
    }
}

/// Current wall-clock time as RFC 3339 (UTC, second precision).
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Format milliseconds as an encoder-friendly seconds string (`12.345`).
pub fn format_secs(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// Parse an `HH:MM:SS[.ffffff]` clock string into milliseconds.
pub fn parse_clock_ms(value: &str) -> Option<u64> {
    let mut parts = value.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(hours * 3_600_000 + minutes * 60_000 + (seconds * 1000.0).round() as u64)
}
