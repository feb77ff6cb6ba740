//! UDP transport built on socket2

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::constants::MAX_DATAGRAM_PAYLOAD;
use crate::error::NetworkError;
use crate::network::{DatagramTransport, RecvOutcome};

/// Create a bound UDP socket. `buffer_bytes` of 0 keeps the OS defaults.
pub fn create_socket(bind: SocketAddr, buffer_bytes: usize) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(bind), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    if buffer_bytes > 0 {
        socket.set_recv_buffer_size(buffer_bytes)?;
        socket.set_send_buffer_size(buffer_bytes)?;
    }
    socket.bind(&bind.into())?;
    Ok(socket.into())
}

/// One persistent UDP socket
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Socket the receive lane listens on
    pub fn bind_receiver(
        listen: SocketAddr,
        peer: SocketAddr,
        receive_timeout: Duration,
        buffer_bytes: usize,
    ) -> Result<Self, NetworkError> {
        let socket = create_socket(listen, buffer_bytes)
            .map_err(|source| NetworkError::BindFailed { addr: listen, source })?;
        socket
            .set_read_timeout(Some(receive_timeout))
            .map_err(|source| NetworkError::BindFailed { addr: listen, source })?;

        tracing::info!(listen = %listen, timeout_ms = receive_timeout.as_millis() as u64, "UDP receiver bound");
        Ok(Self { socket, peer })
    }

    /// Socket the transmit lane sends from, bound to an ephemeral port
    pub fn bind_sender(peer: SocketAddr, buffer_bytes: usize) -> Result<Self, NetworkError> {
        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (std::net::Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = create_socket(local, buffer_bytes)
            .map_err(|source| NetworkError::BindFailed { addr: local, source })?;

        tracing::info!(peer = %peer, "UDP sender ready");
        Ok(Self { socket, peer })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramTransport for UdpTransport {
    fn send(&mut self, payload: &[u8]) -> Result<usize, NetworkError> {
        if payload.len() > MAX_DATAGRAM_PAYLOAD {
            return Err(NetworkError::PacketTooLarge(payload.len()));
        }
        self.socket
            .send_to(payload, self.peer)
            .map_err(NetworkError::SendFailed)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<RecvOutcome, NetworkError> {
        match self.socket.recv_from(buf) {
            Ok((len, from)) => Ok(RecvOutcome::Datagram {
                len,
                from: Some(from),
            }),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(RecvOutcome::TimedOut)
            }
            Err(e) => Err(NetworkError::ReceiveFailed(e)),
        }
    }
}
