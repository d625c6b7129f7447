use crate::client::constants::*;
use crate::client::error::{ClientError, Result};
use crate::clock::lag_ms;
use hdrhistogram::Histogram;
use tracing::{debug, warn};

/// Timestamps of one completed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    pub sent_ns: i64,
    pub server_ns: i64,
    pub received_ns: i64,
}

impl LatencySample {
    /// Client send to client receive.
    pub fn total_lag_ms(&self) -> f64 {
        lag_ms(self.sent_ns, self.received_ns)
    }

    /// Client send to server receipt. Sensitive to clock skew between hosts.
    pub fn server_lag_ms(&self) -> f64 {
        lag_ms(self.sent_ns, self.server_ns)
    }
}

/// Per-transport latency aggregate.
///
/// Owned by a single probe engine and handed over by value once the engine
/// finishes.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    first_ms: Option<f64>,
    max_ms: Option<f64>,
    hist: Histogram<u64>,
    clamped_count: usize,
    attempts: u64,
    abandoned: u64,
}

impl LatencyStats {
    pub fn new() -> Result<Self> {
        let hist = Histogram::<u64>::new_with_bounds(
            HISTOGRAM_LOW_BOUND_US,
            HISTOGRAM_HIGH_BOUND_US,
            HISTOGRAM_SIGNIFICANT_DIGITS,
        )
        .map_err(|e| ClientError::Measurement(format!("Failed to create histogram: {}", e)))?;

        Ok(Self {
            first_ms: None,
            max_ms: None,
            hist,
            clamped_count: 0,
            attempts: 0,
            abandoned: 0,
        })
    }

    /// Record a completed probe that took `attempts` transmissions.
    pub fn record(&mut self, sample: &LatencySample, attempts: u32) {
        let total_ms = sample.total_lag_ms();

        if self.first_ms.is_none() {
            debug!(first_latency_ms = total_ms, "First latency recorded");
            self.first_ms = Some(total_ms);
        }
        if self.max_ms.map_or(true, |max| total_ms > max) {
            self.max_ms = Some(total_ms);
        }

        let micros = (total_ms * 1000.0).max(0.0) as u64;
        let clamped = micros.clamp(HISTOGRAM_LOW_BOUND_US, HISTOGRAM_HIGH_BOUND_US);
        if micros != clamped {
            self.clamped_count += 1;
            warn!(
                latency_us = micros,
                clamped_us = clamped,
                "Latency clamped to histogram bounds"
            );
        }
        self.hist.saturating_record(clamped);
        self.attempts += u64::from(attempts);
    }

    /// Record a probe given up after `attempts` transmissions.
    pub fn record_abandoned(&mut self, attempts: u32) {
        self.abandoned += 1;
        self.attempts += u64::from(attempts);
    }

    /// Total lag of the first completed probe.
    pub fn first_latency(&self) -> Option<f64> {
        self.first_ms
    }

    /// First latency, or zero before any probe completed.
    pub fn first_latency_ms(&self) -> f64 {
        self.first_ms.unwrap_or(0.0)
    }

    /// Largest total lag seen, or zero before any probe completed.
    pub fn max_latency_ms(&self) -> f64 {
        self.max_ms.unwrap_or(0.0)
    }

    pub fn mean_ms(&self) -> f64 {
        self.hist.mean() / 1000.0
    }

    pub fn percentile_ms(&self, quantile: f64) -> f64 {
        self.hist.value_at_quantile(quantile) as f64 / 1000.0
    }

    /// Completed probes
    pub fn count(&self) -> u64 {
        self.hist.len()
    }

    /// Transmissions across completed and abandoned probes
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned
    }

    pub fn clamped_count(&self) -> usize {
        self.clamped_count
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_first_and_max_invariants(lags in proptest::collection::vec(0i64..10_000_000_000, 1..200)) {
            let mut stats = LatencyStats::new().unwrap();
            let mut running_max = f64::MIN;

            for &lag in &lags {
                stats.record(&LatencySample { sent_ns: 0, server_ns: 0, received_ns: lag }, 1);
                // never decreases
                prop_assert!(stats.max_latency_ms() >= running_max);
                running_max = stats.max_latency_ms();
            }

            let expected_max = lags.iter().copied().max().unwrap() as f64 / 1e6;
            prop_assert_eq!(stats.max_latency_ms(), expected_max);
            prop_assert_eq!(stats.first_latency(), Some(lags[0] as f64 / 1e6));
            prop_assert_eq!(stats.count(), lags.len() as u64);
        }
    }
}
