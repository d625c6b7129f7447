//! Constants used throughout the client

use std::time::Duration;

/// How long the datagram driver waits for a matching reply before retransmitting
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-call timeout of an HTTP probe
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Capacity of the queue between the reply listener and the datagram driver
pub const REPLY_QUEUE_CAPACITY: usize = 10;

/// Pause after a failed read in the reply listener
pub const LISTENER_BACKOFF: Duration = Duration::from_millis(100);

/// In-flight datagram probes per engine
pub const IN_FLIGHT_CAPACITY: usize = 1;

/// Progress bar tick interval in milliseconds
pub const PROGRESS_TICK_INTERVAL_MS: u64 = 100;

/// Histogram lower bound in microseconds
pub const HISTOGRAM_LOW_BOUND_US: u64 = 1;

/// Histogram upper bound in microseconds (one minute)
pub const HISTOGRAM_HIGH_BOUND_US: u64 = 60_000_000;

/// Histogram significant digits for precision
pub const HISTOGRAM_SIGNIFICANT_DIGITS: u8 = 3;

/// Latency below this is shown in green
pub const FAST_LATENCY_MS: f64 = 50.0;

/// Latency below this is shown in yellow, above it in red
pub const SLOW_LATENCY_MS: f64 = 250.0;
