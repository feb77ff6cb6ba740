//! Receive → decrypt → play, with silence flushing during network gaps

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::audio::{AudioFrame, AudioPlaybackDevice};
use crate::cipher::{CipherKey, FrameCipher};
use crate::clock::{Clock, MonotonicClock};
use crate::config::AppConfig;
use crate::constants::BYTES_PER_SAMPLE;

/// After the first failure in a row, only every Nth one is logged at warn
const TRANSPORT_ERROR_LOG_EVERY: u64 = 100;
use crate::control::ControlState;
use crate::lane::watchdog::SilenceWatchdog;
use crate::network::{DatagramTransport, RecvOutcome};

/// Settings for one [`ReceivePlaybackLane`]
#[derive(Debug, Clone)]
pub struct ReceiveLaneConfig {
    pub frame_bytes: usize,
    pub playback_timeout: Duration,
    pub silence_threshold: Duration,
    /// Zero frames written per flush, at least one
    pub flush_frames: usize,
    pub key: CipherKey,
    /// Pause after a failed receive before trying again
    pub retry_delay: Duration,
}

impl ReceiveLaneConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            frame_bytes: config.audio.frame_bytes,
            playback_timeout: config.playback_timeout(),
            silence_threshold: config.silence_threshold(),
            flush_frames: config.receive.flush_frames,
            key: config.cipher.key(),
            retry_delay: config.receive_timeout(),
        }
    }
}

/// What one iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// A datagram was written to playback; `flushed` if silence went first
    Played { bytes: usize, flushed: bool },
    /// Nothing arrived, still within the silence threshold
    Idle,
    /// Nothing arrived and the threshold passed; silence was written
    Flushed,
    /// The payload could not be decrypted
    Dropped,
    PlaybackFailed,
    TransportFailed,
}

/// Receive lane counters
#[derive(Debug, Default)]
pub struct ReceiveStats {
    datagrams_received: AtomicU64,
    bytes_received: AtomicU64,
    frames_played: AtomicU64,
    silence_flushes: AtomicU64,
    cipher_rejects: AtomicU64,
    playback_errors: AtomicU64,
    transport_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiveStatsSnapshot {
    pub datagrams_received: u64,
    pub bytes_received: u64,
    pub frames_played: u64,
    pub silence_flushes: u64,
    pub cipher_rejects: u64,
    pub playback_errors: u64,
    pub transport_errors: u64,
}

impl ReceiveStats {
    pub fn snapshot(&self) -> ReceiveStatsSnapshot {
        ReceiveStatsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_played: self.frames_played.load(Ordering::Relaxed),
            silence_flushes: self.silence_flushes.load(Ordering::Relaxed),
            cipher_rejects: self.cipher_rejects.load(Ordering::Relaxed),
            playback_errors: self.playback_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

/// Renders audio from the peer and masks gaps with silence
pub struct ReceivePlaybackLane<P, T, K = MonotonicClock> {
    playback: P,
    transport: T,
    control: Arc<ControlState>,
    cipher: FrameCipher,
    /// Receive buffer, reused for every datagram
    frame: AudioFrame,
    /// Zero frame written on flush
    silence: AudioFrame,
    watchdog: SilenceWatchdog,
    flush_frames: usize,
    playback_timeout: Duration,
    retry_delay: Duration,
    /// Transport failures since the last successful receive
    consecutive_failures: u64,
    clock: K,
    stats: Arc<ReceiveStats>,
}

impl<P: AudioPlaybackDevice, T: DatagramTransport> ReceivePlaybackLane<P, T, MonotonicClock> {
    pub fn new(
        playback: P,
        transport: T,
        control: Arc<ControlState>,
        config: ReceiveLaneConfig,
    ) -> Self {
        Self::with_clock(playback, transport, control, config, MonotonicClock)
    }
}

impl<P: AudioPlaybackDevice, T: DatagramTransport, K: Clock> ReceivePlaybackLane<P, T, K> {
    pub fn with_clock(
        playback: P,
        transport: T,
        control: Arc<ControlState>,
        config: ReceiveLaneConfig,
        clock: K,
    ) -> Self {
        let mut silence = AudioFrame::new(config.frame_bytes);
        silence.fill_silence();

        Self {
            playback,
            transport,
            control,
            cipher: FrameCipher::new(&config.key),
            frame: AudioFrame::new(config.frame_bytes),
            silence,
            watchdog: SilenceWatchdog::new(config.silence_threshold, clock.now()),
            flush_frames: config.flush_frames.max(1),
            playback_timeout: config.playback_timeout,
            retry_delay: config.retry_delay,
            consecutive_failures: 0,
            clock,
            stats: Arc::new(ReceiveStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ReceiveStats> {
        self.stats.clone()
    }

    pub fn run_iteration(&mut self) -> ReceiveOutcome {
        tracing::trace!("Receiving");
        let received = self.transport.recv(self.frame.storage_mut());
        let now = self.clock.now();

        match received {
            Ok(RecvOutcome::Datagram { len, from }) => {
                self.consecutive_failures = 0;
                self.stats.datagrams_received.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
                self.control.set_receiving_active(true);

                // A gap can end without any timed-out receive in between;
                // silence still has to reach the device before new audio
                let flushed = self.watchdog.expired(now);
                if flushed {
                    self.flush_silence();
                }
                self.watchdog.feed(now);

                // Whatever state the sender used, the local flag decides
                if self.control.encryption_enabled() {
                    // The raw length must be block aligned; nothing is trimmed
                    self.frame.set_len(len);
                    if let Err(e) = self.cipher.decrypt_in_place(self.frame.as_bytes_mut()) {
                        self.stats.cipher_rejects.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, from = ?from, "Undecryptable datagram dropped");
                        return ReceiveOutcome::Dropped;
                    }
                } else {
                    // Drop a trailing half sample
                    self.frame.set_len(len - len % BYTES_PER_SAMPLE);
                }

                match self.playback.write(self.frame.as_bytes(), self.playback_timeout) {
                    Ok(bytes) => {
                        self.stats.frames_played.fetch_add(1, Ordering::Relaxed);
                        ReceiveOutcome::Played { bytes, flushed }
                    }
                    Err(e) => {
                        self.stats.playback_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, "Playback write failed");
                        ReceiveOutcome::PlaybackFailed
                    }
                }
            }
            Ok(RecvOutcome::TimedOut) => {
                self.consecutive_failures = 0;
                self.control.set_receiving_active(false);
                if self.watchdog.expired(now) {
                    self.flush_silence();
                    // Restart the interval so the next flush is a full
                    // threshold away
                    self.watchdog.feed(now);
                    ReceiveOutcome::Flushed
                } else {
                    ReceiveOutcome::Idle
                }
            }
            Err(e) => {
                self.control.set_receiving_active(false);
                let failures = self.stats.transport_errors.fetch_add(1, Ordering::Relaxed) + 1;
                self.consecutive_failures += 1;
                if self.consecutive_failures == 1 || failures % TRANSPORT_ERROR_LOG_EVERY == 0 {
                    tracing::warn!(error = %e, failures, "Receive failed");
                } else {
                    tracing::debug!(error = %e, "Receive failed");
                }
                ReceiveOutcome::TransportFailed
            }
        }
    }

    /// Write zero frames so the device stops replaying stale audio
    fn flush_silence(&mut self) {
        self.stats.silence_flushes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(frames = self.flush_frames, "Flushing playback with silence");
        for _ in 0..self.flush_frames {
            if let Err(e) = self.playback.write(self.silence.as_bytes(), self.playback_timeout) {
                self.stats.playback_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "Silence write failed");
                break;
            }
        }
    }

    /// Loop while `running` is set; the receive timeout paces the loop
    pub fn run(mut self, running: Arc<AtomicBool>) {
        tracing::info!(
            frame_bytes = self.frame.capacity(),
            silence_threshold_ms = self.watchdog.threshold().as_millis() as u64,
            "Receive lane started"
        );
        while running.load(Ordering::Relaxed) {
            if self.run_iteration() == ReceiveOutcome::TransportFailed {
                // A failing socket returns at once; keep the loop paced
                thread::sleep(self.retry_delay);
            }
        }
        tracing::info!("Receive lane stopped");
    }
}
