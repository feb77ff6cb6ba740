//! Audio subsystem module
//!
//! Lanes talk to audio hardware through two small blocking traits. Every call
//! takes an explicit deadline so no lane can stall indefinitely on a device.

pub mod buffer;
pub mod capture;
#[cfg(feature = "audio-io")]
pub mod device;
pub mod frame;
pub mod memory;
pub mod playback;

use std::time::Duration;

use crate::error::AudioError;

pub use buffer::{SampleRing, SharedSampleRing};
pub use capture::RingCapture;
#[cfg(feature = "audio-io")]
pub use capture::CpalCapture;
#[cfg(feature = "audio-io")]
pub use device::{get_device_by_id, list_devices, resolve_device, AudioDevice, AudioDeviceInfo, Direction};
pub use frame::AudioFrame;
pub use playback::RingPlayback;
#[cfg(feature = "audio-io")]
pub use playback::CpalPlayback;

/// Result of a bounded capture read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRead {
    /// This many bytes of PCM were written to the front of the buffer
    Filled(usize),
    /// The deadline passed before a full buffer was available
    TimedOut,
}

/// Source of 16-bit signed mono PCM
pub trait AudioCaptureDevice: Send {
    /// Fill up to `buf.len()` bytes, waiting at most `timeout`
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<CaptureRead, AudioError>;
}

/// Sink for 16-bit signed mono PCM
pub trait AudioPlaybackDevice: Send {
    /// Queue `buf` for playback, waiting at most `timeout` for room.
    /// Returns the number of bytes accepted.
    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, AudioError>;
}

impl<T: AudioCaptureDevice + ?Sized> AudioCaptureDevice for Box<T> {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<CaptureRead, AudioError> {
        (**self).read(buf, timeout)
    }
}

impl<T: AudioPlaybackDevice + ?Sized> AudioPlaybackDevice for Box<T> {
    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, AudioError> {
        (**self).write(buf, timeout)
    }
}
