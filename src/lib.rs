//! # Walkie Link
//!
//! Two-node encrypted voice link over UDP. Each node runs the same binary in
//! one of two complementary roles and talks to a single, statically known peer.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                                 NODE                                 │
//! │                                                                      │
//! │   ┌──────────────┐          ControlState          ┌──────────────┐   │
//! │   │ Input poller │──▶ transmit / encryption ◀─────│ Status board │   │
//! │   └──────────────┘         receiving ◀──┐         └──────────────┘   │
//! │                                         │                            │
//! │  Capture/Transmit lane (thread)         │  Receive/Playback lane     │
//! │  ┌──────────────┐                       │  ┌──────────────┐          │
//! │  │   Capture    │                       └──│ UDP receive  │◀─────────┼── peer
//! │  └──────┬───────┘                          └──────┬───────┘          │
//! │         ▼                                         ▼                  │
//! │  ┌──────────────┐                          ┌──────────────┐          │
//! │  │ Gain / HPF   │                          │ AES-128 ECB  │          │
//! │  └──────┬───────┘                          │   decrypt    │          │
//! │         ▼                                  └──────┬───────┘          │
//! │  ┌──────────────┐                                 ▼                  │
//! │  │ AES-128 ECB  │                          ┌──────────────┐          │
//! │  │   encrypt    │                          │   Playback   │◀─ silence│
//! │  └──────┬───────┘                          └──────────────┘   flush  │
//! │         ▼                                                            │
//! │  ┌──────────────┐                                                    │
//! │  │ UDP send     │────────────────────────────────────────────────────┼─▶ peer
//! │  └──────────────┘                                                    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The wire payload is exactly the (possibly encrypted) PCM bytes of one frame.
//! There is no header, so the receiver cannot tell which encryption state the
//! sender used.

pub mod audio;
pub mod cipher;
pub mod clock;
pub mod config;
pub mod control;
pub mod display;
pub mod dsp;
pub mod error;
pub mod input;
pub mod lane;
pub mod network;
pub mod node;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Capture and playback sample rate (16-bit signed mono PCM)
    pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

    /// Bytes per frame; also the datagram payload size
    pub const DEFAULT_FRAME_BYTES: usize = 1024;

    /// Largest payload either lane will put on or accept from the wire
    pub const MAX_DATAGRAM_PAYLOAD: usize = 1024;

    /// AES block size; encrypted frames must be a multiple of this
    pub const CIPHER_BLOCK_SIZE: usize = 16;

    /// Bytes per PCM sample
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// UDP port both roles listen on and send to
    pub const DEFAULT_UDP_PORT: u16 = 1234;

    /// Fixed gain applied to captured audio
    pub const DEFAULT_GAIN: f32 = 10.0;

    /// Coefficient for the optional high-pass stage
    pub const DEFAULT_HIGH_PASS_ALPHA: f32 = 0.9;

    /// Receive silence longer than this triggers a flush
    pub const DEFAULT_SILENCE_THRESHOLD: Duration = Duration::from_millis(100);

    /// Zero frames written per silence flush
    pub const DEFAULT_FLUSH_FRAMES: usize = 5;

    /// Pause between transmit lane iterations
    pub const DEFAULT_TRANSMIT_YIELD: Duration = Duration::from_millis(10);

    /// How long a receive call waits for a datagram
    pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

    /// Bounded wait for a capture read
    pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_millis(100);

    /// Bounded wait for a playback write
    pub const DEFAULT_PLAYBACK_TIMEOUT: Duration = Duration::from_millis(100);

    /// Button polling interval
    pub const DEFAULT_INPUT_POLL: Duration = Duration::from_millis(10);

    /// Status refresh interval
    pub const DEFAULT_DISPLAY_REFRESH: Duration = Duration::from_millis(200);

    /// Interval between lane statistics log lines
    pub const STATS_LOG_INTERVAL: Duration = Duration::from_secs(5);

    /// Frames of audio the playback queue can hold ahead of the device
    pub const DEFAULT_PLAYBACK_QUEUE_FRAMES: usize = 8;

    /// Shared AES-128 key used when no key is configured
    pub const DEFAULT_CIPHER_KEY: [u8; 16] = [
        0x3d, 0xf2, 0x67, 0xf0, 0x34, 0xa9, 0xbc, 0x0b,
        0x8e, 0xac, 0xe5, 0x8f, 0x12, 0x3c, 0x56, 0x78,
    ];
}
