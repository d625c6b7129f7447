//! Nanosecond wall-clock timestamps shared by client and server.

use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of nanosecond timestamps.
///
/// Request identifiers are minted from this clock and the server stamps its
/// replies with it, so both sides must agree on the epoch (Unix time).
pub trait Clock: Send + Sync + Debug {
    fn now_ns(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
    }
}

/// Milliseconds elapsed between two nanosecond timestamps.
pub fn lag_ms(from_ns: i64, to_ns: i64) -> f64 {
    to_ns.saturating_sub(from_ns) as f64 / 1e6
}
