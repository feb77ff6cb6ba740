//! Status display collaborator
//!
//! Reads the control flags at a coarse cadence and re-renders only when one
//! of them changed. It never touches audio or network state.

use std::fmt;
use std::sync::Arc;

use crate::config::Role;
use crate::control::{ControlSnapshot, ControlState};

pub const TITLE: &str = "Walkie-Talkie";

/// What the link is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkActivity {
    Idle,
    Transmitting,
    Receiving,
    FullDuplex,
}

/// Background colour for each activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColour {
    Blue,
    Red,
    Green,
    Purple,
}

impl LinkActivity {
    pub fn from_snapshot(flags: &ControlSnapshot) -> Self {
        match (flags.transmit_enabled, flags.receiving_active) {
            (true, true) => LinkActivity::FullDuplex,
            (true, false) => LinkActivity::Transmitting,
            (false, true) => LinkActivity::Receiving,
            (false, false) => LinkActivity::Idle,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LinkActivity::Idle => "",
            LinkActivity::Transmitting => "Transmitting",
            LinkActivity::Receiving => "Receiving",
            LinkActivity::FullDuplex => "Full-Duplex",
        }
    }

    pub fn colour(self) -> StatusColour {
        match self {
            LinkActivity::Idle => StatusColour::Blue,
            LinkActivity::Transmitting => StatusColour::Red,
            LinkActivity::Receiving => StatusColour::Green,
            LinkActivity::FullDuplex => StatusColour::Purple,
        }
    }
}

/// Everything the display shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusView {
    pub role: Role,
    pub activity: LinkActivity,
    pub encryption_enabled: bool,
}

impl StatusView {
    pub fn new(role: Role, flags: &ControlSnapshot) -> Self {
        Self {
            role,
            activity: LinkActivity::from_snapshot(flags),
            encryption_enabled: flags.encryption_enabled,
        }
    }

    pub fn encryption_line(&self) -> String {
        format!(
            "Encryption: {}",
            if self.encryption_enabled { "ON" } else { "OFF" }
        )
    }

    /// Title, role, activity and encryption lines, top to bottom
    pub fn lines(&self) -> [String; 4] {
        [
            TITLE.to_string(),
            self.role.label().to_string(),
            self.activity.label().to_string(),
            self.encryption_line(),
        ]
    }
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", TITLE, self.role.label())?;
        if self.activity != LinkActivity::Idle {
            write!(f, " | {}", self.activity.label())?;
        }
        write!(f, " | {}", self.encryption_line())
    }
}

/// Where rendered status goes
pub trait StatusSink: Send {
    fn render(&mut self, view: &StatusView);
}

/// Renders status as log lines
#[derive(Debug, Default)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn render(&mut self, view: &StatusView) {
        tracing::info!(colour = ?view.activity.colour(), "{}", view);
    }
}

/// Polls the control flags and re-renders on change
pub struct StatusBoard<S> {
    sink: S,
    control: Arc<ControlState>,
    role: Role,
    last: Option<ControlSnapshot>,
}

impl<S: StatusSink> StatusBoard<S> {
    pub fn new(sink: S, control: Arc<ControlState>, role: Role) -> Self {
        Self {
            sink,
            control,
            role,
            last: None,
        }
    }

    /// Render if anything changed since the last render, or on first call.
    /// Returns whether it rendered.
    pub fn refresh(&mut self) -> bool {
        let flags = self.control.snapshot();
        if self.last == Some(flags) {
            return false;
        }
        self.last = Some(flags);
        self.sink.render(&StatusView::new(self.role, &flags));
        true
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
