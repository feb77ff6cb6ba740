//! Process-wide control flags shared by the lanes and collaborators
//!
//! Each flag has a single writer: the input poller owns `transmit_enabled`
//! and `encryption_enabled`, the receive lane owns `receiving_active`. All
//! accesses use `Relaxed` ordering. A reader may see a value that is one
//! polling interval stale; that only decides whether a frame is processed in
//! this iteration and never touches buffer contents, since every lane owns
//! its buffers exclusively.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ControlConfig;

#[derive(Debug)]
pub struct ControlState {
    transmit_enabled: AtomicBool,
    encryption_enabled: AtomicBool,
    receiving_active: AtomicBool,
}

/// Point-in-time copy of the three flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlSnapshot {
    pub transmit_enabled: bool,
    pub encryption_enabled: bool,
    pub receiving_active: bool,
}

impl ControlState {
    pub fn new(transmit_enabled: bool, encryption_enabled: bool) -> Self {
        Self {
            transmit_enabled: AtomicBool::new(transmit_enabled),
            encryption_enabled: AtomicBool::new(encryption_enabled),
            receiving_active: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &ControlConfig) -> Self {
        Self::new(config.transmit_on_start, config.encryption_on_start)
    }

    pub fn transmit_enabled(&self) -> bool {
        self.transmit_enabled.load(Ordering::Relaxed)
    }

    pub fn set_transmit_enabled(&self, enabled: bool) {
        self.transmit_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn encryption_enabled(&self) -> bool {
        self.encryption_enabled.load(Ordering::Relaxed)
    }

    /// Flip encryption and return the new value
    pub fn toggle_encryption(&self) -> bool {
        !self.encryption_enabled.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn receiving_active(&self) -> bool {
        self.receiving_active.load(Ordering::Relaxed)
    }

    pub fn set_receiving_active(&self, active: bool) {
        self.receiving_active.store(active, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            transmit_enabled: self.transmit_enabled(),
            encryption_enabled: self.encryption_enabled(),
            receiving_active: self.receiving_active(),
        }
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::from_config(&ControlConfig::default())
    }
}
