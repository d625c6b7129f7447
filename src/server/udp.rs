//! Stateless UDP echo server.
//!
//! Every request datagram gets a `"<serverTimestamp> <requestID>"` reply sent
//! back to its source. Retransmitted requests are answered again; the client
//! sorts out duplicates by identifier.

use crate::clock::{lag_ms, Clock};
use crate::protocol::{request_id_lossy, EchoReply, MAX_DATAGRAM_SIZE};
use crate::server::error::{Result, ServerError};
use crate::server::monitor::TransportCounters;
use crate::server::ERROR_BACKOFF;
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

pub struct UdpEchoServer {
    socket: UdpSocket,
    clock: Arc<dyn Clock>,
    counters: Arc<TransportCounters>,
}

impl UdpEchoServer {
    pub fn bind(
        addr: &str,
        clock: Arc<dyn Clock>,
        counters: Arc<TransportCounters>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        info!(address = %addr, "Listening (UDP)");
        Ok(Self {
            socket,
            clock,
            counters,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Answer datagrams until the socket becomes unusable.
    pub fn serve(&self) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) => {
                    read_failed(e, &self.counters)?;
                    continue;
                }
            };
            self.counters.increment_received();

            let reply = echo_reply(&buf[..len], self.clock.now_ns());
            info!(
                peer = %peer,
                request_id = %reply.request_id,
                length = len,
                lag_ms = lag_ms(reply.request_id.0, reply.server_ts),
                "UDP: received a message"
            );

            match self.socket.send_to(&reply.encode(), peer) {
                Ok(_) => self.counters.increment_sent(),
                Err(e) => {
                    self.counters.increment_error();
                    warn!(error = %e, peer = %peer, "Could not send UDP response");
                }
            }
            debug!(peer = %peer, "UDP reply sent");
        }
    }
}

/// Stop on `InvalidInput`; otherwise count the error and back off.
fn read_failed(e: io::Error, counters: &TransportCounters) -> Result<()> {
    if e.kind() == ErrorKind::InvalidInput {
        error!(error = %e, "Could not read from UDP socket");
        return Err(ServerError::Io(e));
    }
    counters.increment_error();
    warn!(error = %e, "Could not read from UDP");
    thread::sleep(ERROR_BACKOFF);
    Ok(())
}

/// Reply to a request datagram received at `received_ns`.
pub fn echo_reply(request: &[u8], received_ns: i64) -> EchoReply {
    EchoReply::new(received_ns, request_id_lossy(request))
}
