//! UDP datagram transport.

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::error::TransportError;
use crate::traits::Transport;

/// Largest UDP payload a response can occupy.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// A connected UDP socket with a read timeout, one request/response pair
/// per [`exchange`](Transport::exchange) call.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Resolves `target` and connects a local ephemeral socket to it.
    pub fn connect(target: &str, timeout: Duration) -> Result<UdpTransport, TransportError> {
        let peer = target
            .to_socket_addrs()
            .map_err(|_| TransportError::Unresolvable(target.to_string()))?
            .next()
            .ok_or_else(|| TransportError::Unresolvable(target.to_string()))?;
        let bind_addr: SocketAddr = match peer {
            SocketAddr::V4(_) => (std::net::Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(peer)?;
        socket.set_read_timeout(Some(timeout))?;
        log::debug!("udp transport connected to {peer}");
        Ok(UdpTransport { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for UdpTransport {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.socket.send(request)?;
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        match self.socket.recv(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                log::trace!("received {n} bytes from {}", self.peer);
                Ok(buf)
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(TransportError::Timeout)
            }
            // A connected UDP socket can surface ICMP unreachable as
            // ConnectionRefused on the next recv; report it as-is.
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn send(&mut self, request: &[u8]) -> Result<(), TransportError> {
        self.socket.send(request)?;
        Ok(())
    }
}
