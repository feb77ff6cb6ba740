//! Button input collaborator
//!
//! Two buttons are polled at a coarse interval. Push-to-talk is level driven:
//! transmit while held. The encryption button toggles on each press edge.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::control::ControlState;

/// Current button levels; `true` means pressed
pub trait ButtonPanel: Send + Sync {
    fn ptt_pressed(&self) -> bool;
    fn encryption_pressed(&self) -> bool;
}

impl<T: ButtonPanel + ?Sized> ButtonPanel for Arc<T> {
    fn ptt_pressed(&self) -> bool {
        (**self).ptt_pressed()
    }

    fn encryption_pressed(&self) -> bool {
        (**self).encryption_pressed()
    }
}

/// Edges seen by one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputEdges {
    /// `Some(true)` on press, `Some(false)` on release
    pub ptt: Option<bool>,
    /// New encryption state if the button was pressed
    pub encryption: Option<bool>,
}

/// Detects edges on a [`ButtonPanel`] and writes the result into
/// [`ControlState`]
pub struct InputPoller<B> {
    panel: B,
    control: Arc<ControlState>,
    last_ptt: bool,
    last_encryption: bool,
}

impl<B: ButtonPanel> InputPoller<B> {
    pub fn new(panel: B, control: Arc<ControlState>) -> Self {
        Self {
            panel,
            control,
            last_ptt: false,
            last_encryption: false,
        }
    }

    pub fn poll(&mut self) -> InputEdges {
        let mut edges = InputEdges::default();

        let ptt = self.panel.ptt_pressed();
        if ptt != self.last_ptt {
            self.last_ptt = ptt;
            self.control.set_transmit_enabled(ptt);
            tracing::info!("Button {}", if ptt { "pressed" } else { "released" });
            edges.ptt = Some(ptt);
        }

        let encryption = self.panel.encryption_pressed();
        if encryption != self.last_encryption {
            self.last_encryption = encryption;
            if encryption {
                let enabled = self.control.toggle_encryption();
                tracing::info!("Encryption {}", if enabled { "enabled" } else { "disabled" });
                edges.encryption = Some(enabled);
            }
        }

        edges
    }
}

/// Buttons driven by text commands, for hosts without physical buttons
///
/// `ptt` toggles the held state, `ptt on` / `ptt off` set it, and `enc`
/// presses the encryption button once.
#[derive(Debug, Default)]
pub struct ConsoleButtons {
    ptt_held: AtomicBool,
    /// Latched press, released by the first poll that sees it
    encryption_press: AtomicBool,
}

impl ConsoleButtons {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_command(&self, line: &str) -> Result<(), String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["ptt"] => {
                self.ptt_held.fetch_xor(true, Ordering::Relaxed);
            }
            ["ptt", "on"] => self.ptt_held.store(true, Ordering::Relaxed),
            ["ptt", "off"] => self.ptt_held.store(false, Ordering::Relaxed),
            ["enc"] => self.encryption_press.store(true, Ordering::Relaxed),
            [] => {}
            _ => return Err(format!("unknown command '{}' (try: ptt, ptt on, ptt off, enc)", line.trim())),
        }
        Ok(())
    }
}

/// Apply each line of `reader` as a console command until end of input or a
/// read error. Returns the number of lines read.
pub fn read_commands<R: BufRead>(reader: R, buttons: &ConsoleButtons) -> usize {
    let mut count = 0;
    for line in reader.lines() {
        match line {
            Ok(line) => {
                count += 1;
                if let Err(msg) = buttons.handle_command(&line) {
                    tracing::warn!("{}", msg);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Console input closed");
                break;
            }
        }
    }
    count
}

/// Read stdin commands on a plain thread. Blocking stdin reads cannot be
/// cancelled, so the thread is detached and never holds up shutdown.
pub fn spawn_console_reader(buttons: Arc<ConsoleButtons>) -> io::Result<()> {
    thread::Builder::new()
        .name("console-input".into())
        .spawn(move || {
            read_commands(io::stdin().lock(), &buttons);
            tracing::debug!("Console input ended");
        })?;
    Ok(())
}

impl ButtonPanel for ConsoleButtons {
    fn ptt_pressed(&self) -> bool {
        self.ptt_held.load(Ordering::Relaxed)
    }

    fn encryption_pressed(&self) -> bool {
        self.encryption_press.swap(false, Ordering::Relaxed)
    }
}
