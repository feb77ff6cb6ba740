//! Datagram transport for the audio lanes
//!
//! Payloads are raw frame bytes with no header. Each lane owns one transport
//! handle for its whole lifetime.

pub mod loopback;
pub mod udp;

use std::net::SocketAddr;

use crate::error::NetworkError;

pub use loopback::LoopbackTransport;
pub use udp::{create_socket, UdpTransport};

/// Result of a bounded receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// A datagram of `len` bytes now sits at the front of the buffer
    Datagram { len: usize, from: Option<SocketAddr> },
    /// Nothing arrived within the receive timeout
    TimedOut,
}

/// Connectionless, best-effort transport to a single peer
pub trait DatagramTransport: Send {
    /// Send one datagram to the peer
    fn send(&mut self, payload: &[u8]) -> Result<usize, NetworkError>;

    /// Wait up to the transport's receive timeout for one datagram
    fn recv(&mut self, buf: &mut [u8]) -> Result<RecvOutcome, NetworkError>;
}

impl<T: DatagramTransport + ?Sized> DatagramTransport for Box<T> {
    fn send(&mut self, payload: &[u8]) -> Result<usize, NetworkError> {
        (**self).send(payload)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<RecvOutcome, NetworkError> {
        (**self).recv(buf)
    }
}
