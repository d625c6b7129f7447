//! HTTP probe engine
//!
//! Each probe posts the current timestamp and blocks until the response
//! arrives. Failed calls are retried immediately with a fresh timestamp.

use crate::client::datagram::ProbeOutcome;
use crate::client::error::{ClientError, Result};
use crate::client::reporter::{Transport, TransportReport};
use crate::client::retry::RetryPolicy;
use crate::client::statistics::{LatencySample, LatencyStats};
use crate::clock::Clock;
use crate::protocol::{parse_timestamp_lossy, RequestId};
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Request/response transport used by the HTTP probe engine.
pub trait SubmitTransport: Send {
    /// Submit `ts` and return the response body (the server receipt timestamp).
    fn submit(&mut self, ts: i64) -> Result<String>;
}

/// Sequential HTTP probe driver
pub struct ConnectionProbe<T: SubmitTransport> {
    transport: T,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    progress: ProgressBar,
}

impl<T: SubmitTransport> ConnectionProbe<T> {
    /// Only `policy.max_attempts` applies here; the transport owns its call timeout.
    pub fn new(transport: T, policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            policy,
            clock,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn run(mut self, count: usize) -> Result<TransportReport> {
        let start_time = Instant::now();
        let mut stats = LatencyStats::new()?;

        for probe_num in 0..count {
            match self.probe_once() {
                Ok(outcome) => {
                    stats.record(&outcome.sample, outcome.attempts);
                    self.progress
                        .set_message(format!("{:.1} ms", outcome.sample.total_lag_ms()));
                }
                Err(ClientError::RetriesExhausted { id, attempts }) => {
                    warn!(
                        probe_num = probe_num + 1,
                        ts = %id,
                        attempts = attempts,
                        "HTTP: giving up on probe"
                    );
                    stats.record_abandoned(attempts);
                }
                Err(e) => {
                    self.progress.abandon();
                    return Err(e);
                }
            }
            self.progress.inc(1);
        }

        self.progress.finish();
        let elapsed = start_time.elapsed();
        debug!(
            probes = count,
            completed = stats.count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "HTTP probe run finished"
        );
        Ok(TransportReport::new(Transport::Connection, elapsed, stats))
    }

    /// Submit until one call succeeds.
    ///
    /// A body that is not a timestamp still completes the probe, with a server
    /// timestamp of zero.
    pub fn probe_once(&mut self) -> Result<ProbeOutcome> {
        let mut attempts = 0u32;
        let mut last_ts = 0;

        loop {
            if !self.policy.allows(attempts) {
                return Err(ClientError::RetriesExhausted {
                    id: RequestId(last_ts),
                    attempts,
                });
            }
            attempts += 1;

            let sent_ns = self.clock.now_ns();
            last_ts = sent_ns;
            match self.transport.submit(sent_ns) {
                Ok(body) => {
                    let sample = LatencySample {
                        sent_ns,
                        server_ns: parse_timestamp_lossy(&body),
                        received_ns: self.clock.now_ns(),
                    };
                    info!(
                        total_lag_ms = sample.total_lag_ms(),
                        server_lag_ms = sample.server_lag_ms(),
                        attempts = attempts,
                        "HTTP: read response from server"
                    );
                    return Ok(ProbeOutcome { sample, attempts });
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempts, "HTTP: could not send message");
                }
            }
        }
    }
}
