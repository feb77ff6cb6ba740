//! The two directional halves of the duplex pipeline
//!
//! Lanes never talk to each other. Each one owns its buffers, its device and
//! its transport handle, and only shares the [`ControlState`] flags.
//!
//! [`ControlState`]: crate::control::ControlState

pub mod receive;
pub mod transmit;
pub mod watchdog;

pub use receive::{ReceiveLaneConfig, ReceiveOutcome, ReceivePlaybackLane, ReceiveStats};
pub use transmit::{CaptureTransmitLane, TransmitLaneConfig, TransmitOutcome, TransmitStats};
pub use watchdog::SilenceWatchdog;
