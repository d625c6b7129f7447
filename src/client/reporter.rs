use crate::client::constants::{FAST_LATENCY_MS, SLOW_LATENCY_MS};
use crate::client::statistics::LatencyStats;
use colored::*;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The two transports being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// UDP with retransmission
    Datagram,
    /// HTTP/1.1 over TCP
    Connection,
}

impl Transport {
    pub fn label(&self) -> &'static str {
        match self {
            Transport::Datagram => "UDP",
            Transport::Connection => "HTTP",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a probe engine hands back when its run is over.
#[derive(Debug, Clone)]
pub struct TransportReport {
    pub transport: Transport,
    pub elapsed: Duration,
    pub stats: LatencyStats,
}

impl TransportReport {
    pub fn new(transport: Transport, elapsed: Duration, stats: LatencyStats) -> Self {
        Self {
            transport,
            elapsed,
            stats,
        }
    }

    /// One-line summary: duration, first latency and max latency.
    pub fn summary_line(&self) -> String {
        format!(
            "{}: {:.3?} (first latency {:.1} ms, max latency {:.1} ms)",
            self.transport,
            self.elapsed,
            self.stats.first_latency_ms(),
            self.stats.max_latency_ms()
        )
    }
}

/// Reporter for printing the comparison
pub struct Reporter;

// Width of the transport label column
const LABEL_WIDTH: usize = 5;

impl Reporter {
    fn colorize_latency(ms: f64) -> ColoredString {
        let text = format!("{:.1} ms", ms);
        if ms < FAST_LATENCY_MS {
            text.green()
        } else if ms < SLOW_LATENCY_MS {
            text.yellow()
        } else {
            text.red()
        }
    }

    /// Print the results of both transports
    pub fn print_results(&self, reports: &[&TransportReport]) {
        debug!(transports = reports.len(), "Printing results");

        println!("\n{}", "┌─────────────────────────────┐".cyan());
        println!("{}", "│  pingpair results           │".cyan());
        println!("{}", "└─────────────────────────────┘".cyan());
        println!();

        for report in reports {
            info!("{}", report.summary_line());
            self.print_transport(report);
        }
    }

    fn print_transport(&self, report: &TransportReport) {
        let stats = &report.stats;
        let label = format!("{:<width$}", report.transport.label(), width = LABEL_WIDTH);

        if stats.count() == 0 {
            warn!(transport = %report.transport, "No probe completed");
            println!(
                "{} {} {}",
                label.bold(),
                format!("{:.3?}", report.elapsed),
                "no probe completed".red()
            );
            println!();
            return;
        }

        let first = stats
            .first_latency()
            .map(Self::colorize_latency)
            .unwrap_or_else(|| "n/a".normal());

        println!(
            "{} {}  first {}  max {}",
            label.bold(),
            format!("{:.3?}", report.elapsed),
            first,
            Self::colorize_latency(stats.max_latency_ms())
        );
        println!(
            "{:width$} mean {:.1} ms | p50 {:.1} ms | p99 {:.1} ms",
            "",
            stats.mean_ms(),
            stats.percentile_ms(0.50),
            stats.percentile_ms(0.99),
            width = LABEL_WIDTH
        );

        let retransmissions = stats.attempts().saturating_sub(stats.count() + stats.abandoned());
        let abandoned = if stats.abandoned() > 0 {
            format!("{} abandoned", stats.abandoned()).red()
        } else {
            "0 abandoned".normal()
        };
        println!(
            "{:width$} {} completed, {} retries, {}",
            "",
            stats.count(),
            retransmissions,
            abandoned,
            width = LABEL_WIDTH
        );
        if stats.clamped_count() > 0 {
            println!(
                "{:width$} {}",
                "",
                format!(
                    "{} samples outside histogram bounds (percentiles clamped)",
                    stats.clamped_count()
                )
                .yellow(),
                width = LABEL_WIDTH
            );
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::statistics::LatencySample;

    #[test]
    fn test_transport_labels() {
        assert_eq!(Transport::Datagram.to_string(), "UDP");
        assert_eq!(Transport::Connection.to_string(), "HTTP");
    }

    #[test]
    fn test_summary_line() {
        let mut stats = LatencyStats::new().unwrap();
        stats.record(
            &LatencySample {
                sent_ns: 0,
                server_ns: 0,
                received_ns: 12_300_000,
            },
            1,
        );
        stats.record(
            &LatencySample {
                sent_ns: 0,
                server_ns: 0,
                received_ns: 45_600_000,
            },
            1,
        );
        let report = TransportReport::new(Transport::Datagram, Duration::from_millis(1500), stats);

        assert_eq!(
            report.summary_line(),
            "UDP: 1.500s (first latency 12.3 ms, max latency 45.6 ms)"
        );
    }

    #[test]
    fn test_print_results_without_samples() {
        let report = TransportReport::new(
            Transport::Connection,
            Duration::from_secs(1),
            LatencyStats::new().unwrap(),
        );
        Reporter.print_results(&[&report]);
    }
}
