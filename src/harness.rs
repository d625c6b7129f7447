//! Runs the UDP and HTTP probe engines side by side.
//!
//! Each engine runs on its own thread and hands its report back through the
//! thread's join handle, so the stats are never shared while being written.

use crate::client::{
    ClientError, ConnectionProbe, DatagramProbe, DatagramSocket, HttpEchoClient,
    ProgressTracker, Result, SubmitTransport, Transport, TransportReport, UdpDatagramSocket,
};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::info;

/// Final reports of both engines.
#[derive(Debug, Clone)]
pub struct HarnessReport {
    pub datagram: TransportReport,
    pub connection: TransportReport,
}

impl HarnessReport {
    pub fn reports(&self) -> [&TransportReport; 2] {
        [&self.datagram, &self.connection]
    }
}

/// Run `count` probes on both engines concurrently and wait for both.
pub fn run_both<S, T>(
    datagram: DatagramProbe<S>,
    connection: ConnectionProbe<T>,
    count: usize,
) -> Result<HarnessReport>
where
    S: DatagramSocket + 'static,
    T: SubmitTransport + 'static,
{
    let udp = thread::Builder::new()
        .name("udp-probe".into())
        .spawn(move || datagram.run(count))?;
    let http = thread::Builder::new()
        .name("http-probe".into())
        .spawn(move || connection.run(count))?;

    // Both threads are joined before either result is inspected.
    let datagram = join(udp, Transport::Datagram);
    let connection = join(http, Transport::Connection);

    Ok(HarnessReport {
        datagram: datagram?,
        connection: connection?,
    })
}

fn join(
    handle: JoinHandle<Result<TransportReport>>,
    transport: Transport,
) -> Result<TransportReport> {
    handle
        .join()
        .map_err(|_| ClientError::EnginePanicked(transport.label()))?
}

/// Build both engines from `config` and run them against the configured server.
pub fn run_client(config: &Config) -> Result<HarnessReport> {
    config.validate()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let progress = ProgressTracker::new(config.quiet);

    let socket = UdpDatagramSocket::connect(&config.udp_target())?;
    let datagram = DatagramProbe::start(socket, config.datagram_policy(), Arc::clone(&clock))?
        .with_progress(progress.bar(Transport::Datagram, config.num)?);

    let transport = HttpEchoClient::new(&config.host, config.port, config.request_timeout())?;
    let connection = ConnectionProbe::new(transport, config.connection_policy(), clock)
        .with_progress(progress.bar(Transport::Connection, config.num)?);

    info!(
        udp = %config.udp_target(),
        http = %config.http_authority(),
        probes = config.num,
        "Starting probes"
    );
    let started = Instant::now();
    let report = run_both(datagram, connection, config.num)?;
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Both probe runs finished"
    );
    Ok(report)
}
