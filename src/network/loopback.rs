//! In-process datagram transport pair
//!
//! Two connected endpoints over bounded crossbeam channels. Used to run both
//! lanes of two nodes inside one process without sockets.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

use crate::constants::MAX_DATAGRAM_PAYLOAD;
use crate::error::NetworkError;
use crate::network::{DatagramTransport, RecvOutcome};

const LOOPBACK_QUEUE: usize = 64;

pub struct LoopbackTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    receive_timeout: Duration,
}

impl LoopbackTransport {
    /// Two endpoints; what one sends the other receives
    pub fn pair(receive_timeout: Duration) -> (Self, Self) {
        let (a_tx, b_rx) = bounded(LOOPBACK_QUEUE);
        let (b_tx, a_rx) = bounded(LOOPBACK_QUEUE);
        (
            Self {
                tx: a_tx,
                rx: a_rx,
                receive_timeout,
            },
            Self {
                tx: b_tx,
                rx: b_rx,
                receive_timeout,
            },
        )
    }
}

impl DatagramTransport for LoopbackTransport {
    fn send(&mut self, payload: &[u8]) -> Result<usize, NetworkError> {
        if payload.len() > MAX_DATAGRAM_PAYLOAD {
            return Err(NetworkError::PacketTooLarge(payload.len()));
        }
        match self.tx.try_send(payload.to_vec()) {
            // Best effort, like UDP: a full queue drops the datagram
            Ok(()) | Err(TrySendError::Full(_)) => Ok(payload.len()),
            Err(TrySendError::Disconnected(_)) => Err(NetworkError::Closed),
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<RecvOutcome, NetworkError> {
        match self.rx.recv_timeout(self.receive_timeout) {
            Ok(datagram) => {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                Ok(RecvOutcome::Datagram { len, from: None })
            }
            Err(RecvTimeoutError::Timeout) => Ok(RecvOutcome::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(NetworkError::Closed),
        }
    }
}
