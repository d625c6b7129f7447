use anyhow::{Context, Result};
use clap::Parser;
use pingpair::client::Reporter;
use pingpair::clock::{Clock, SystemClock};
use pingpair::config::{Config, RunMode};
use pingpair::harness;
use pingpair::logging::init_logging;
use pingpair::server::{HttpEchoServer, ServerMonitor, UdpEchoServer};
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

fn main() {
    // Parse CLI arguments
    let config = Config::parse();

    // Initialize structured logging with config options
    init_logging(&config.log_level, config.is_json_format());

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let mode = match config.mode() {
        Ok(mode) => mode,
        Err(e) => {
            error!(error = %e, "No run mode selected");
            eprintln!("Error: {} (use --server or --client)", e);
            std::process::exit(1);
        }
    };

    let result = match mode {
        RunMode::Server => run_server(&config),
        RunMode::Client => run_client(&config),
    };
    if let Err(e) = result {
        error!(error = %e, "pingpair failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_server(config: &Config) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let monitor = ServerMonitor::new(config.update_interval);

    let http = HttpEchoServer::bind(
        &config.http_bind_address(),
        Arc::clone(&clock),
        monitor.http_counters(),
    )
    .context("Could not start HTTP server")?;
    let udp = UdpEchoServer::bind(&config.udp_bind_address(), clock, monitor.udp_counters())
        .context("Could not start UDP server")?;

    if !config.quiet {
        monitor.start_display();
    } else {
        info!("Running in quiet mode (status line disabled)");
    }

    thread::Builder::new()
        .name("http-echo".into())
        .spawn(move || {
            if let Err(e) = http.serve() {
                error!(error = %e, "HTTP server stopped");
                std::process::exit(1);
            }
        })
        .context("Could not spawn HTTP server thread")?;

    let served = udp.serve();
    let stats = monitor.stats();
    info!(
        udp_received = stats.udp_received,
        udp_sent = stats.udp_sent,
        http_received = stats.http_received,
        http_sent = stats.http_sent,
        errors = stats.errors,
        uptime_s = stats.elapsed.as_secs(),
        "Server counters at shutdown"
    );
    served.context("UDP server stopped")?;
    Ok(())
}

fn run_client(config: &Config) -> Result<()> {
    let report = harness::run_client(config).context("Probe run failed")?;
    Reporter.print_results(&report.reports());
    Ok(())
}
