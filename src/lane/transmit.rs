//! Capture → condition → encrypt → send

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::audio::{AudioCaptureDevice, AudioFrame, CaptureRead};
use crate::cipher::{CipherKey, FrameCipher};
use crate::config::AppConfig;
use crate::control::ControlState;
use crate::dsp::SignalConditioner;
use crate::network::DatagramTransport;

/// Settings for one [`CaptureTransmitLane`]
#[derive(Debug, Clone)]
pub struct TransmitLaneConfig {
    pub frame_bytes: usize,
    pub capture_timeout: Duration,
    pub yield_interval: Duration,
    pub conditioner: SignalConditioner,
    pub key: CipherKey,
}

impl TransmitLaneConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            frame_bytes: config.audio.frame_bytes,
            capture_timeout: config.capture_timeout(),
            yield_interval: config.transmit_yield(),
            conditioner: SignalConditioner::from_config(&config.conditioning),
            key: config.cipher.key(),
        }
    }
}

/// What one iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitOutcome {
    /// Transmit disabled; no audio work
    Idle,
    Sent { bytes: usize, encrypted: bool },
    CaptureTimedOut,
    CaptureFailed,
    EncryptFailed,
    SendFailed,
}

/// Transmit lane counters
#[derive(Debug, Default)]
pub struct TransmitStats {
    frames_captured: AtomicU64,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    capture_timeouts: AtomicU64,
    capture_errors: AtomicU64,
    encrypt_errors: AtomicU64,
    send_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransmitStatsSnapshot {
    pub frames_captured: u64,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub capture_timeouts: u64,
    pub capture_errors: u64,
    pub encrypt_errors: u64,
    pub send_errors: u64,
}

impl TransmitStats {
    pub fn snapshot(&self) -> TransmitStatsSnapshot {
        TransmitStatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            capture_timeouts: self.capture_timeouts.load(Ordering::Relaxed),
            capture_errors: self.capture_errors.load(Ordering::Relaxed),
            encrypt_errors: self.encrypt_errors.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

/// Moves live audio to the peer while transmit is enabled
pub struct CaptureTransmitLane<C, T> {
    capture: C,
    transport: T,
    control: Arc<ControlState>,
    conditioner: SignalConditioner,
    cipher: FrameCipher,
    /// Reused for every iteration
    frame: AudioFrame,
    capture_timeout: Duration,
    yield_interval: Duration,
    stats: Arc<TransmitStats>,
}

impl<C: AudioCaptureDevice, T: DatagramTransport> CaptureTransmitLane<C, T> {
    pub fn new(
        capture: C,
        transport: T,
        control: Arc<ControlState>,
        config: TransmitLaneConfig,
    ) -> Self {
        Self {
            capture,
            transport,
            control,
            cipher: FrameCipher::new(&config.key),
            conditioner: config.conditioner,
            frame: AudioFrame::new(config.frame_bytes),
            capture_timeout: config.capture_timeout,
            yield_interval: config.yield_interval,
            stats: Arc::new(TransmitStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<TransmitStats> {
        self.stats.clone()
    }

    /// One pass of the loop, without the trailing yield
    pub fn run_iteration(&mut self) -> TransmitOutcome {
        // One consistent view of the flags for the whole iteration
        let flags = self.control.snapshot();
        if !flags.transmit_enabled {
            return TransmitOutcome::Idle;
        }

        match self.capture.read(self.frame.storage_mut(), self.capture_timeout) {
            Ok(CaptureRead::Filled(0)) | Ok(CaptureRead::TimedOut) => {
                self.stats.capture_timeouts.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(timeout_ms = self.capture_timeout.as_millis() as u64, "Capture read timed out");
                return TransmitOutcome::CaptureTimedOut;
            }
            Ok(CaptureRead::Filled(n)) => {
                self.stats.frames_captured.fetch_add(1, Ordering::Relaxed);
                self.frame.set_len(n);
            }
            Err(e) => {
                self.stats.capture_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "Capture read failed, skipping frame");
                return TransmitOutcome::CaptureFailed;
            }
        }

        self.conditioner.process(self.frame.as_bytes_mut());

        if flags.encryption_enabled {
            // Short reads are padded with silence to a whole block
            self.frame.pad_to_block();
            if let Err(e) = self.cipher.encrypt_in_place(self.frame.as_bytes_mut()) {
                self.stats.encrypt_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "Frame encryption failed, skipping frame");
                return TransmitOutcome::EncryptFailed;
            }
        }

        match self.transport.send(self.frame.as_bytes()) {
            Ok(bytes) => {
                self.stats.frames_sent.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
                tracing::trace!(bytes, encrypted = flags.encryption_enabled, "Frame sent");
                TransmitOutcome::Sent {
                    bytes,
                    encrypted: flags.encryption_enabled,
                }
            }
            Err(e) => {
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "Send failed, frame dropped");
                TransmitOutcome::SendFailed
            }
        }
    }

    /// Loop at a fixed cadence while `running` is set
    pub fn run(mut self, running: Arc<AtomicBool>) {
        tracing::info!(
            frame_bytes = self.frame.capacity(),
            gain = self.conditioner.gain(),
            high_pass = self.conditioner.high_pass_enabled(),
            "Transmit lane started"
        );
        while running.load(Ordering::Relaxed) {
            self.run_iteration();
            thread::sleep(self.yield_interval);
        }
        tracing::info!("Transmit lane stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frame::{pcm_from_samples, samples_from_pcm};
    use crate::audio::memory::{CaptureStep, ScriptedCapture};
    use crate::constants::DEFAULT_CIPHER_KEY;
    use crate::error::NetworkError;
    use crate::network::{LoopbackTransport, RecvOutcome};

    fn lane_config(frame_bytes: usize) -> TransmitLaneConfig {
        TransmitLaneConfig {
            frame_bytes,
            capture_timeout: Duration::from_millis(10),
            yield_interval: Duration::from_millis(1),
            conditioner: SignalConditioner::new(10.0),
            key: CipherKey::new(DEFAULT_CIPHER_KEY),
        }
    }

    fn recv_payload(peer: &mut LoopbackTransport) -> Option<Vec<u8>> {
        let mut buf = [0u8; 2048];
        match peer.recv(&mut buf).unwrap() {
            RecvOutcome::Datagram { len, .. } => Some(buf[..len].to_vec()),
            RecvOutcome::TimedOut => None,
        }
    }

    /// Transport whose sends always fail
    struct BrokenTransport;

    impl DatagramTransport for BrokenTransport {
        fn send(&mut self, _payload: &[u8]) -> Result<usize, NetworkError> {
            Err(NetworkError::SendFailed(std::io::Error::other("unreachable")))
        }

        fn recv(&mut self, _buf: &mut [u8]) -> Result<RecvOutcome, NetworkError> {
            Ok(RecvOutcome::TimedOut)
        }
    }

    #[test]
    fn test_idle_when_transmit_disabled() {
        let capture = ScriptedCapture::repeating(vec![1; 32]);
        let reads = capture.read_counter();
        let (tx, mut peer) = LoopbackTransport::pair(Duration::from_millis(5));
        let control = Arc::new(ControlState::new(false, true));
        let mut lane = CaptureTransmitLane::new(capture, tx, control, lane_config(32));

        assert_eq!(lane.run_iteration(), TransmitOutcome::Idle);
        assert_eq!(reads.load(Ordering::Relaxed), 0);
        assert!(recv_payload(&mut peer).is_none());
    }

    #[test]
    fn test_plaintext_frame_is_amplified() {
        let pcm = pcm_from_samples(&[1, -2, 3000, -3000, 0, 0, 0, 0]);
        let capture = ScriptedCapture::new([CaptureStep::Frame(pcm)]);
        let (tx, mut peer) = LoopbackTransport::pair(Duration::from_millis(50));
        let control = Arc::new(ControlState::new(true, false));
        let mut lane = CaptureTransmitLane::new(capture, tx, control, lane_config(16));

        assert_eq!(
            lane.run_iteration(),
            TransmitOutcome::Sent { bytes: 16, encrypted: false }
        );
        let payload = recv_payload(&mut peer).unwrap();
        assert_eq!(
            samples_from_pcm(&payload),
            vec![10, -20, 30000, -30000, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_encrypted_frame_decrypts_to_conditioned_audio() {
        let pcm = pcm_from_samples(&[100; 16]);
        let capture = ScriptedCapture::new([CaptureStep::Frame(pcm)]);
        let (tx, mut peer) = LoopbackTransport::pair(Duration::from_millis(50));
        let control = Arc::new(ControlState::new(true, true));
        let mut lane = CaptureTransmitLane::new(capture, tx, control, lane_config(32));

        assert_eq!(
            lane.run_iteration(),
            TransmitOutcome::Sent { bytes: 32, encrypted: true }
        );
        let mut payload = recv_payload(&mut peer).unwrap();
        assert_ne!(samples_from_pcm(&payload), vec![1000; 16]);

        FrameCipher::new(&CipherKey::new(DEFAULT_CIPHER_KEY))
            .decrypt_in_place(&mut payload)
            .unwrap();
        assert_eq!(samples_from_pcm(&payload), vec![1000; 16]);
    }

    #[test]
    fn test_short_read_padded_before_encryption() {
        // 5 samples = 10 bytes, padded to one 16-byte block
        let capture = ScriptedCapture::new([CaptureStep::Frame(pcm_from_samples(&[1; 5]))]);
        let (tx, mut peer) = LoopbackTransport::pair(Duration::from_millis(50));
        let control = Arc::new(ControlState::new(true, true));
        let mut lane = CaptureTransmitLane::new(capture, tx, control, lane_config(64));

        assert_eq!(
            lane.run_iteration(),
            TransmitOutcome::Sent { bytes: 16, encrypted: true }
        );
        let mut payload = recv_payload(&mut peer).unwrap();
        FrameCipher::new(&CipherKey::new(DEFAULT_CIPHER_KEY))
            .decrypt_in_place(&mut payload)
            .unwrap();
        assert_eq!(samples_from_pcm(&payload), vec![10, 10, 10, 10, 10, 0, 0, 0]);
    }

    #[test]
    fn test_capture_problems_skip_send() {
        let capture = ScriptedCapture::new([
            CaptureStep::TimedOut,
            CaptureStep::Fail("i2s gone".into()),
            CaptureStep::Frame(vec![0; 16]),
        ]);
        let (tx, mut peer) = LoopbackTransport::pair(Duration::from_millis(20));
        let control = Arc::new(ControlState::new(true, false));
        let mut lane = CaptureTransmitLane::new(capture, tx, control, lane_config(16));
        let stats = lane.stats();

        assert_eq!(lane.run_iteration(), TransmitOutcome::CaptureTimedOut);
        assert_eq!(lane.run_iteration(), TransmitOutcome::CaptureFailed);
        assert!(recv_payload(&mut peer).is_none());
        assert!(matches!(lane.run_iteration(), TransmitOutcome::Sent { .. }));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.capture_timeouts, 1);
        assert_eq!(snapshot.capture_errors, 1);
        assert_eq!(snapshot.frames_captured, 1);
        assert_eq!(snapshot.frames_sent, 1);
    }

    #[test]
    fn test_encrypt_failure_counted_apart_from_capture() {
        // 20-byte frames cannot be padded to a whole block inside the buffer
        let capture = ScriptedCapture::repeating(vec![1; 20]);
        let (tx, mut peer) = LoopbackTransport::pair(Duration::from_millis(5));
        let control = Arc::new(ControlState::new(true, true));
        let mut lane = CaptureTransmitLane::new(capture, tx, control.clone(), lane_config(20));

        assert_eq!(lane.run_iteration(), TransmitOutcome::EncryptFailed);
        assert!(recv_payload(&mut peer).is_none());

        // Plaintext still goes out at that size
        assert!(!control.toggle_encryption());
        assert!(matches!(lane.run_iteration(), TransmitOutcome::Sent { bytes: 20, .. }));

        let snapshot = lane.stats().snapshot();
        assert_eq!(snapshot.frames_captured, 2);
        assert_eq!(snapshot.encrypt_errors, 1);
        assert_eq!(snapshot.capture_errors, 0);
        assert_eq!(snapshot.frames_sent, 1);
    }

    #[test]
    fn test_send_failure_is_not_fatal() {
        let capture = ScriptedCapture::repeating(vec![0; 16]);
        let control = Arc::new(ControlState::new(true, true));
        let mut lane = CaptureTransmitLane::new(capture, BrokenTransport, control, lane_config(16));

        assert_eq!(lane.run_iteration(), TransmitOutcome::SendFailed);
        assert_eq!(lane.run_iteration(), TransmitOutcome::SendFailed);
        assert_eq!(lane.stats().snapshot().send_errors, 2);
    }

    #[test]
    fn test_flag_change_seen_next_iteration() {
        let capture = ScriptedCapture::repeating(pcm_from_samples(&[7; 8]));
        let (tx, mut peer) = LoopbackTransport::pair(Duration::from_millis(20));
        let control = Arc::new(ControlState::new(true, false));
        let mut lane = CaptureTransmitLane::new(capture, tx, control.clone(), lane_config(16));

        assert!(matches!(lane.run_iteration(), TransmitOutcome::Sent { .. }));
        control.set_transmit_enabled(false);
        assert_eq!(lane.run_iteration(), TransmitOutcome::Idle);
        control.set_transmit_enabled(true);
        assert!(matches!(lane.run_iteration(), TransmitOutcome::Sent { .. }));

        // Both frames intact
        for _ in 0..2 {
            assert_eq!(samples_from_pcm(&recv_payload(&mut peer).unwrap()), vec![70; 8]);
        }
    }

    #[test]
    fn test_run_stops_when_flag_cleared() {
        let capture = ScriptedCapture::repeating(vec![0; 16]);
        let (tx, _peer) = LoopbackTransport::pair(Duration::from_millis(5));
        let control = Arc::new(ControlState::new(false, false));
        let lane = CaptureTransmitLane::new(capture, tx, control, lane_config(16));

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let handle = thread::spawn(move || lane.run(flag));
        thread::sleep(Duration::from_millis(20));
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();
    }
}
