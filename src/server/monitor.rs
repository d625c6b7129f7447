//! Server monitoring and statistics display

use colored::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Time without requests before the server is shown as idle (milliseconds).
const IDLE_THRESHOLD_MS: u64 = 1_500;

/// Lock-free request counters for one transport.
///
/// `Relaxed` ordering is enough: the counters are only ever summed for display.
#[derive(Debug, Default)]
pub struct TransportCounters {
    received: AtomicU64,
    sent: AtomicU64,
    errors: AtomicU64,
}

impl TransportCounters {
    #[inline]
    pub fn increment_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Monitor for both echo servers.
///
/// The servers bump atomic counters; a background thread redraws a status
/// line so the receive loops never block on the terminal.
pub struct ServerMonitor {
    udp: Arc<TransportCounters>,
    http: Arc<TransportCounters>,
    start_time: Instant,
    update_interval: Duration,
}

impl ServerMonitor {
    pub fn new(update_interval_ms: u64) -> Self {
        Self {
            udp: Arc::new(TransportCounters::default()),
            http: Arc::new(TransportCounters::default()),
            start_time: Instant::now(),
            update_interval: Duration::from_millis(update_interval_ms),
        }
    }

    pub fn udp_counters(&self) -> Arc<TransportCounters> {
        Arc::clone(&self.udp)
    }

    pub fn http_counters(&self) -> Arc<TransportCounters> {
        Arc::clone(&self.http)
    }

    /// Start the background display thread.
    pub fn start_display(&self) {
        let udp = Arc::clone(&self.udp);
        let http = Arc::clone(&self.http);
        let update_interval = self.update_interval;

        thread::spawn(move || {
            let mut last_total = 0u64;
            let mut last_request_time = Instant::now();

            loop {
                thread::sleep(update_interval);

                let total = udp.received() + http.received();
                let now = Instant::now();
                if total != last_total {
                    last_request_time = now;
                    last_total = total;
                }
                let is_idle = now.duration_since(last_request_time)
                    >= Duration::from_millis(IDLE_THRESHOLD_MS);

                print!("\r{}", Self::status_line(is_idle, &udp, &http));
                std::io::Write::flush(&mut std::io::stdout()).ok();
            }
        });
    }

    fn status_line(is_idle: bool, udp: &TransportCounters, http: &TransportCounters) -> String {
        let status = if is_idle {
            "IDLE".normal()
        } else {
            "ACTIVE".green().bold()
        };
        format!(
            "[{}] UDP {}/{} ({} err) | HTTP {}/{} ({} err)",
            status,
            udp.received(),
            udp.sent(),
            udp.errors(),
            http.received(),
            http.sent(),
            http.errors()
        )
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            udp_received: self.udp.received(),
            udp_sent: self.udp.sent(),
            http_received: self.http.received(),
            http_sent: self.http.sent(),
            errors: self.udp.errors() + self.http.errors(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

/// Snapshot of server counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStats {
    pub udp_received: u64,
    pub udp_sent: u64,
    pub http_received: u64,
    pub http_sent: u64,
    pub errors: u64,
    pub elapsed: Duration,
}
