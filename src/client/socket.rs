use crate::client::error::{ClientError, Result};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::{debug, warn};

/// Datagram socket shared by the probe driver (sending) and the reply
/// listener (receiving).
pub trait DatagramSocket: Send + Sync {
    /// Send one datagram to the connected peer
    fn send_datagram(&self, payload: &[u8]) -> Result<usize>;

    /// Block until a datagram arrives from the connected peer
    fn recv_datagram(&self, buf: &mut [u8]) -> Result<usize>;
}

/// UDP implementation of DatagramSocket, connected to the echo server
#[derive(Debug)]
pub struct UdpDatagramSocket {
    socket: UdpSocket,
}

impl UdpDatagramSocket {
    /// Bind an ephemeral local port and connect it to `addr`.
    ///
    /// Connecting makes the kernel discard datagrams from any other source.
    pub fn connect(addr: &str) -> Result<Self> {
        let peer = addr
            .to_socket_addrs()
            .map_err(|e| ClientError::Socket(format!("Could not resolve {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| ClientError::Socket(format!("No address found for {}", addr)))?;

        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        debug!(local = %local, peer = %peer, "Binding UDP socket");
        let socket = UdpSocket::bind(local).map_err(|e| {
            warn!(error = %e, "Failed to bind socket");
            ClientError::Socket(format!("Failed to bind to {}: {}", local, e))
        })?;
        socket.connect(peer).map_err(|e| {
            warn!(error = %e, "Failed to connect socket");
            ClientError::Socket(format!("Failed to connect to {}: {}", peer, e))
        })?;
        debug!("Socket connected successfully");

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl DatagramSocket for UdpDatagramSocket {
    fn send_datagram(&self, payload: &[u8]) -> Result<usize> {
        let bytes_sent = self.socket.send(payload)?;
        debug!(bytes_sent = bytes_sent, "Datagram sent");
        Ok(bytes_sent)
    }

    fn recv_datagram(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.socket.recv(buf)?;
        debug!(bytes_received = len, "Datagram received");
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        pub DatagramSocket {}

        impl DatagramSocket for DatagramSocket {
            fn send_datagram(&self, payload: &[u8]) -> Result<usize>;
            fn recv_datagram(&self, buf: &mut [u8]) -> Result<usize>;
        }
    }

    #[test]
    fn test_udp_socket_connect() {
        let socket = UdpDatagramSocket::connect("127.0.0.1:9");
        assert!(socket.is_ok());
        assert!(socket.unwrap().local_addr().unwrap().port() > 0);
    }

    #[test]
    fn test_unresolvable_address() {
        let socket = UdpDatagramSocket::connect("not an address");
        assert!(matches!(socket, Err(ClientError::Socket(_))));
    }

    #[test]
    fn test_send_recv_loopback() -> Result<()> {
        let peer = UdpSocket::bind("127.0.0.1:0")?;
        let client = UdpDatagramSocket::connect(&peer.local_addr()?.to_string())?;

        client.send_datagram(b"1 ping")?;
        let mut buf = [0u8; 64];
        let (len, from) = peer.recv_from(&mut buf)?;
        assert_eq!(&buf[..len], b"1 ping");

        peer.send_to(b"2 1", from)?;
        let len = client.recv_datagram(&mut buf)?;
        assert_eq!(&buf[..len], b"2 1");
        Ok(())
    }
}

#[cfg(test)]
pub use tests::MockDatagramSocket;
