//! Error types for the voice link

use std::time::Duration;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio device errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Device closed")]
    Closed,

    #[error("Write timed out after {waited:?} with {written} bytes queued")]
    WriteTimeout { written: usize, waited: Duration },

    #[error("Buffer length {0} is not a whole number of samples")]
    OddLength(usize),

    #[cfg(feature = "audio-io")]
    #[error("cpal error: {0}")]
    CpalError(String),
}

/// Frame cipher errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CipherError {
    #[error("Buffer length {0} is not a multiple of the 16-byte block size")]
    UnalignedLength(usize),

    #[error("Key must be 16 bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed on {addr}: {source}")]
    BindFailed {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("Receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    #[error("Packet too large: {0} bytes")]
    PacketTooLarge(usize),

    #[error("Transport closed")]
    Closed,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(feature = "audio-io")]
impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        AudioError::CpalError(e.to_string())
    }
}

#[cfg(feature = "audio-io")]
impl From<cpal::BuildStreamError> for AudioError {
    fn from(e: cpal::BuildStreamError) -> Self {
        AudioError::StreamError(e.to_string())
    }
}

#[cfg(feature = "audio-io")]
impl From<cpal::PlayStreamError> for AudioError {
    fn from(e: cpal::PlayStreamError) -> Self {
        AudioError::StreamError(e.to_string())
    }
}
