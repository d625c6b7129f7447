//! UDP probe engine
//!
//! Sending and receiving are split across two threads. A reply listener owns
//! the receive side of the socket, decodes every datagram into an
//! [`EchoReply`] and pushes it onto a small bounded queue. The probe driver
//! sends one request at a time, then drains that queue until a reply with
//! the pending identifier shows up or the wait window closes, in which case
//! the identical request is sent again.
//!
//! Replies to earlier probes (or duplicates produced by retransmission) carry
//! identifiers that are no longer in flight and are dropped.

use crate::client::constants::{IN_FLIGHT_CAPACITY, LISTENER_BACKOFF, REPLY_QUEUE_CAPACITY};
use crate::client::error::{ClientError, Result};
use crate::client::pending::{InFlight, PendingProbe};
use crate::client::reporter::{Transport, TransportReport};
use crate::client::retry::RetryPolicy;
use crate::client::socket::DatagramSocket;
use crate::client::statistics::{LatencySample, LatencyStats};
use crate::clock::Clock;
use crate::protocol::{EchoReply, ProbeRequest, RequestId, MAX_DATAGRAM_SIZE, PROBE_TEXT};
use indicatif::ProgressBar;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A probe that got its reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub sample: LatencySample,
    pub attempts: u32,
}

/// Sequential UDP probe driver
pub struct DatagramProbe<S: DatagramSocket + 'static> {
    socket: Arc<S>,
    replies: Receiver<EchoReply>,
    in_flight: InFlight,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    last_id: Option<i64>,
    progress: ProgressBar,
}

impl<S: DatagramSocket + 'static> DatagramProbe<S> {
    /// Spawn the reply listener for `socket` and build a driver around it.
    pub fn start(socket: S, policy: RetryPolicy, clock: Arc<dyn Clock>) -> Result<Self> {
        let socket = Arc::new(socket);
        let (tx, rx) = mpsc::sync_channel(REPLY_QUEUE_CAPACITY);
        spawn_reply_listener(Arc::clone(&socket), tx)?;
        Ok(Self::from_parts(socket, rx, policy, clock))
    }

    /// Build a driver that reads replies from `replies` instead of its own listener.
    pub fn from_parts(
        socket: Arc<S>,
        replies: Receiver<EchoReply>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            socket,
            replies,
            in_flight: InFlight::with_capacity(IN_FLIGHT_CAPACITY),
            policy,
            clock,
            last_id: None,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run `count` probes back to back.
    ///
    /// Probes abandoned under a bounded [`RetryPolicy`] are counted and the run
    /// moves on. Only a dead reply listener ends the run early.
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
                        request_id = %id,
                        attempts = attempts,
                        "UDP: giving up on probe"
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
            "UDP probe run finished"
        );
        Ok(TransportReport::new(Transport::Datagram, elapsed, stats))
    }

    /// Send one probe and retransmit it until its reply arrives.
    pub fn probe_once(&mut self) -> Result<ProbeOutcome> {
        let id = self.mint_id();
        let request = ProbeRequest::new(id, PROBE_TEXT).encode()?;
        self.in_flight.insert(id, id.0)?;

        let mut attempts = 0u32;
        loop {
            if !self.policy.allows(attempts) {
                self.in_flight.abandon(id);
                return Err(ClientError::RetriesExhausted { id, attempts });
            }

            attempts = self.in_flight.mark_sent(id);
            if attempts > 1 {
                debug!(request_id = %id, attempt = attempts, "UDP: retransmitting");
            }
            if let Err(e) = self.socket.send_datagram(&request) {
                warn!(error = %e, request_id = %id, "UDP: could not write to socket");
            }

            if let Some((reply, pending)) = self.await_reply(id)? {
                let sample = LatencySample {
                    sent_ns: pending.sent_ns,
                    server_ns: reply.server_ts,
                    received_ns: self.clock.now_ns(),
                };
                info!(
                    request_id = %id,
                    total_lag_ms = sample.total_lag_ms(),
                    server_lag_ms = sample.server_lag_ms(),
                    attempts = pending.attempts,
                    "UDP: read response from server"
                );
                return Ok(ProbeOutcome {
                    sample,
                    attempts: pending.attempts,
                });
            }
        }
    }

    /// Drain the reply queue for one wait window.
    fn await_reply(&mut self, id: RequestId) -> Result<Option<(EchoReply, PendingProbe)>> {
        let deadline = Instant::now() + self.policy.timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(request_id = %id, "UDP: no reply within timeout");
                return Ok(None);
            }

            match self.replies.recv_timeout(remaining) {
                Ok(reply) => {
                    if let Some(pending) = self.in_flight.resolve(reply.request_id) {
                        return Ok(Some((reply, pending)));
                    }
                    debug!(
                        expected = %id,
                        received = %reply.request_id,
                        "UDP: discarding stale reply"
                    );
                }
                Err(RecvTimeoutError::Timeout) => {
                    debug!(request_id = %id, "UDP: no reply within timeout");
                    return Ok(None);
                }
                Err(RecvTimeoutError::Disconnected) => return Err(ClientError::ListenerGone),
            }
        }
    }

    /// Next identifier: the current timestamp, bumped past the previous one
    /// when the clock has not advanced.
    fn mint_id(&mut self) -> RequestId {
        let now = self.clock.now_ns();
        let id = match self.last_id {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last_id = Some(id);
        RequestId(id)
    }
}

/// Start the background thread that feeds decoded replies to the driver.
pub fn spawn_reply_listener<S: DatagramSocket + 'static>(
    socket: Arc<S>,
    replies: SyncSender<EchoReply>,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("udp-reply-listener".into())
        .spawn(move || listen_for_replies(socket.as_ref(), &replies))?;
    Ok(handle)
}

/// Reply listener loop.
///
/// Read errors are logged and retried after a short pause; malformed frames
/// are logged and dropped. Returns once the driver has dropped its receiver.
pub fn listen_for_replies<S: DatagramSocket + ?Sized>(
    socket: &S,
    replies: &SyncSender<EchoReply>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let len = match socket.recv_datagram(&mut buf) {
            Ok(len) => len,
            Err(e) => {
                warn!(error = %e, "UDP: could not read response from server");
                thread::sleep(LISTENER_BACKOFF);
                continue;
            }
        };

        let reply = match EchoReply::decode(&buf[..len]) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, length = len, "UDP: bad response");
                continue;
            }
        };

        if replies.send(reply).is_err() {
            debug!("Reply queue closed, listener exiting");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::StepClock;
    use crate::client::socket::MockDatagramSocket;
    use std::io::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const MS: i64 = 1_000_000;

    fn policy(timeout_ms: u64) -> RetryPolicy {
        RetryPolicy::unbounded(Duration::from_millis(timeout_ms))
    }

    fn request_id(payload: &[u8]) -> RequestId {
        ProbeRequest::decode(payload).unwrap().id
    }

    /// Echo every request one millisecond after its send time.
    fn echoing_socket(tx: SyncSender<EchoReply>, expected_sends: usize) -> MockDatagramSocket {
        let mut socket = MockDatagramSocket::new();
        socket
            .expect_send_datagram()
            .times(expected_sends)
            .returning(move |payload: &[u8]| {
                let id = request_id(payload);
                tx.send(EchoReply::new(id.0 + MS, id)).unwrap();
                Ok(payload.len())
            });
        socket
    }

    #[test]
    fn test_zero_loss_sends_once_per_probe() -> Result<()> {
        let (tx, rx) = mpsc::sync_channel(REPLY_QUEUE_CAPACITY);
        let socket = echoing_socket(tx, 5);
        let clock = Arc::new(StepClock::new(1_000 * MS, MS));

        let probe = DatagramProbe::from_parts(Arc::new(socket), rx, policy(1000), clock);
        let report = probe.run(5)?;

        assert_eq!(report.transport, Transport::Datagram);
        assert_eq!(report.stats.count(), 5);
        assert_eq!(report.stats.attempts(), 5);
        assert_eq!(report.stats.abandoned(), 0);
        Ok(())
    }

    #[test]
    fn test_lag_from_echoed_timestamps() -> Result<()> {
        let (tx, rx) = mpsc::sync_channel(REPLY_QUEUE_CAPACITY);
        let socket = echoing_socket(tx, 1);
        // id = 1_000_000, receive read = 2_000_000
        let clock = Arc::new(StepClock::new(MS, MS));

        let mut probe = DatagramProbe::from_parts(Arc::new(socket), rx, policy(1000), clock);
        let outcome = probe.probe_once()?;

        assert_eq!(outcome.sample.sent_ns, MS);
        assert_eq!(outcome.sample.server_ns, 2 * MS);
        assert_eq!(outcome.sample.server_lag_ms(), 1.0);
        assert_eq!(outcome.sample.total_lag_ms(), 1.0);
        assert_eq!(outcome.attempts, 1);
        Ok(())
    }

    #[test]
    fn test_non_matching_replies_do_not_end_the_wait() -> Result<()> {
        let (tx, rx) = mpsc::sync_channel(REPLY_QUEUE_CAPACITY);
        let mut socket = MockDatagramSocket::new();
        socket
            .expect_send_datagram()
            .times(1)
            .returning(move |payload: &[u8]| {
                let id = request_id(payload);
                tx.send(EchoReply::new(0, RequestId(id.0 - 1))).unwrap();
                tx.send(EchoReply::new(0, RequestId(42))).unwrap();
                tx.send(EchoReply::new(id.0 + MS, id)).unwrap();
                Ok(payload.len())
            });
        let clock = Arc::new(StepClock::new(100 * MS, MS));

        let mut probe = DatagramProbe::from_parts(Arc::new(socket), rx, policy(1000), clock);
        let outcome = probe.probe_once()?;

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.sample.server_ns, 101 * MS);
        Ok(())
    }

    #[test]
    fn test_retransmits_identical_payload_after_timeout() -> Result<()> {
        let (tx, rx) = mpsc::sync_channel(REPLY_QUEUE_CAPACITY);
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&payloads);
        let mut socket = MockDatagramSocket::new();
        socket
            .expect_send_datagram()
            .times(2)
            .returning(move |payload: &[u8]| {
                let mut seen = seen.lock().unwrap();
                seen.push(payload.to_vec());
                if seen.len() == 2 {
                    let id = request_id(payload);
                    tx.send(EchoReply::new(id.0, id)).unwrap();
                }
                Ok(payload.len())
            });
        let clock = Arc::new(StepClock::new(MS, MS));

        let mut probe = DatagramProbe::from_parts(Arc::new(socket), rx, policy(20), clock);
        let outcome = probe.probe_once()?;

        assert_eq!(outcome.attempts, 2);
        let payloads = payloads.lock().unwrap();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], payloads[1]);
        Ok(())
    }

    #[test]
    fn test_hundred_losses_yield_one_sample() -> Result<()> {
        let (tx, rx) = mpsc::sync_channel(REPLY_QUEUE_CAPACITY);
        let sends = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&sends);
        let mut socket = MockDatagramSocket::new();
        socket
            .expect_send_datagram()
            .times(101)
            .returning(move |payload: &[u8]| {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 == 101 {
                    let id = request_id(payload);
                    tx.send(EchoReply::new(id.0, id)).unwrap();
                }
                Ok(payload.len())
            });
        let clock = Arc::new(StepClock::new(MS, MS));

        let probe = DatagramProbe::from_parts(Arc::new(socket), rx, policy(1), clock);
        let report = probe.run(1)?;

        assert_eq!(sends.load(Ordering::SeqCst), 101);
        assert_eq!(report.stats.count(), 1);
        assert_eq!(report.stats.attempts(), 101);
        Ok(())
    }

    #[test]
    fn test_send_errors_are_retried() -> Result<()> {
        let (tx, rx) = mpsc::sync_channel(REPLY_QUEUE_CAPACITY);
        let mut calls = 0;
        let mut socket = MockDatagramSocket::new();
        socket
            .expect_send_datagram()
            .times(3)
            .returning(move |payload: &[u8]| {
                calls += 1;
                if calls < 3 {
                    return Err(ClientError::Io(std::io::Error::from(
                        ErrorKind::ConnectionRefused,
                    )));
                }
                let id = request_id(payload);
                tx.send(EchoReply::new(id.0, id)).unwrap();
                Ok(payload.len())
            });
        let clock = Arc::new(StepClock::new(MS, MS));

        let mut probe = DatagramProbe::from_parts(Arc::new(socket), rx, policy(5), clock);
        let outcome = probe.probe_once()?;
        assert_eq!(outcome.attempts, 3);
        Ok(())
    }

    #[test]
    fn test_bounded_policy_abandons_probe() -> Result<()> {
        let (_tx, rx) = mpsc::sync_channel::<EchoReply>(REPLY_QUEUE_CAPACITY);
        let mut socket = MockDatagramSocket::new();
        socket
            .expect_send_datagram()
            .times(6)
            .returning(|payload: &[u8]| Ok(payload.len()));
        let clock = Arc::new(StepClock::new(MS, MS));

        let probe = DatagramProbe::from_parts(
            Arc::new(socket),
            rx,
            policy(1).with_max_attempts(3),
            clock,
        );
        let report = probe.run(2)?;

        assert_eq!(report.stats.count(), 0);
        assert_eq!(report.stats.abandoned(), 2);
        assert_eq!(report.stats.attempts(), 6);
        assert_eq!(report.stats.first_latency(), None);
        Ok(())
    }

    #[test]
    fn test_listener_gone() {
        let (tx, rx) = mpsc::sync_channel::<EchoReply>(REPLY_QUEUE_CAPACITY);
        drop(tx);
        let mut socket = MockDatagramSocket::new();
        socket
            .expect_send_datagram()
            .returning(|payload: &[u8]| Ok(payload.len()));
        let clock = Arc::new(StepClock::new(MS, MS));

        let mut probe = DatagramProbe::from_parts(Arc::new(socket), rx, policy(1000), clock);
        assert!(matches!(probe.probe_once(), Err(ClientError::ListenerGone)));
    }

    #[test]
    fn test_ids_are_unique_with_a_stalled_clock() {
        let (_tx, rx) = mpsc::sync_channel::<EchoReply>(REPLY_QUEUE_CAPACITY);
        let clock = Arc::new(StepClock::new(500, 0));
        let mut probe =
            DatagramProbe::from_parts(Arc::new(MockDatagramSocket::new()), rx, policy(1), clock);

        assert_eq!(probe.mint_id(), RequestId(500));
        assert_eq!(probe.mint_id(), RequestId(501));
        assert_eq!(probe.mint_id(), RequestId(502));
    }

    #[test]
    fn test_listener_drops_malformed_frames() {
        let frames: Vec<&'static [u8]> = vec![
            &b"2000 1000"[..],
            &b"garbage"[..],
            &b"1 2 3"[..],
            &b"3000 1001"[..],
        ];
        let mut next = 0usize;
        let mut socket = MockDatagramSocket::new();
        socket.expect_recv_datagram().returning(move |buf: &mut [u8]| {
            let frame = frames[next % frames.len()];
            next += 1;
            buf[..frame.len()].copy_from_slice(frame);
            Ok(frame.len())
        });

        let (tx, rx) = mpsc::sync_channel(REPLY_QUEUE_CAPACITY);
        let handle = spawn_reply_listener(Arc::new(socket), tx).unwrap();

        let timeout = Duration::from_secs(5);
        assert_eq!(
            rx.recv_timeout(timeout).unwrap(),
            EchoReply::new(2000, RequestId(1000))
        );
        assert_eq!(
            rx.recv_timeout(timeout).unwrap(),
            EchoReply::new(3000, RequestId(1001))
        );

        drop(rx);
        handle.join().unwrap();
    }

    #[test]
    fn test_listener_backs_off_on_read_error() {
        let mut failed = false;
        let mut socket = MockDatagramSocket::new();
        socket.expect_recv_datagram().returning(move |buf: &mut [u8]| {
            if !failed {
                failed = true;
                return Err(ClientError::Io(std::io::Error::from(ErrorKind::Other)));
            }
            let frame = b"7 8";
            buf[..frame.len()].copy_from_slice(frame);
            Ok(frame.len())
        });

        let (tx, rx) = mpsc::sync_channel(REPLY_QUEUE_CAPACITY);
        let started = Instant::now();
        let handle = spawn_reply_listener(Arc::new(socket), tx).unwrap();

        let reply = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(reply, EchoReply::new(7, RequestId(8)));
        assert!(started.elapsed() >= LISTENER_BACKOFF);

        drop(rx);
        handle.join().unwrap();
    }
}
