#![forbid(unsafe_code)]

//! Transport surface for the rsnmp client.
//!
//! SNMP frames each request/response as a pair of opaque octet strings
//! over a datagram transport. Everything above the byte exchange
//! (retries, timeout policy beyond a single read, listener loops) lives
//! with the caller.

use std::time::Duration;

pub mod error;
pub mod traits;
pub mod udp;

pub use error::TransportError;
pub use traits::Transport;
pub use udp::{MAX_DATAGRAM_SIZE, UdpTransport};

/// Default agent port (RFC 1157).
pub const SNMP_PORT: u16 = 161;
/// Default trap listener port.
pub const SNMP_TRAP_PORT: u16 = 162;

/// Selects a transport implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportConfig {
    #[default]
    Udp,
}

/// Creates a [`Transport`] out of a [`TransportConfig`].
///
/// ## Arguments
/// * `config` - The transport configuration to make the transport by.
/// * `target` - `host:port` of the peer.
/// * `timeout` - Read timeout for a single exchange.
pub fn make_transport(
    config: &TransportConfig,
    target: &str,
    timeout: Duration,
) -> Result<Box<dyn Transport>, TransportError> {
    match config {
        TransportConfig::Udp => Ok(Box::new(UdpTransport::connect(target, timeout)?)),
    }
}
