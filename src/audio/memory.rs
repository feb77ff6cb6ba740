//! In-memory capture and playback devices
//!
//! Stand-ins for hardware when driving the lanes from tests and benchmarks.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{AudioCaptureDevice, AudioPlaybackDevice, CaptureRead};
use crate::error::AudioError;

/// One scripted response of a [`ScriptedCapture`]
#[derive(Debug, Clone)]
pub enum CaptureStep {
    Frame(Vec<u8>),
    TimedOut,
    Fail(String),
}

/// Capture device that replays a script of frames, timeouts and failures
pub struct ScriptedCapture {
    steps: VecDeque<CaptureStep>,
    /// Served forever once the script runs out
    repeat: Option<Vec<u8>>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedCapture {
    pub fn new(steps: impl IntoIterator<Item = CaptureStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            repeat: None,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Serve `frame` on every read
    pub fn repeating(frame: Vec<u8>) -> Self {
        Self {
            steps: VecDeque::new(),
            repeat: Some(frame),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of read calls, usable after the device moved into a lane
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

impl AudioCaptureDevice for ScriptedCapture {
    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<CaptureRead, AudioError> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let step = match self.steps.pop_front() {
            Some(step) => step,
            None => match &self.repeat {
                Some(frame) => CaptureStep::Frame(frame.clone()),
                None => CaptureStep::TimedOut,
            },
        };

        match step {
            CaptureStep::Frame(frame) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(CaptureRead::Filled(n))
            }
            CaptureStep::TimedOut => Ok(CaptureRead::TimedOut),
            CaptureStep::Fail(msg) => Err(AudioError::StreamError(msg)),
        }
    }
}

/// Handle onto everything a [`RecordingPlayback`] accepted
#[derive(Clone, Default)]
pub struct PlaybackLog {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl PlaybackLog {
    /// Every write, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.lock().is_empty()
    }

    /// Writes consisting only of zero bytes
    pub fn silent_writes(&self) -> usize {
        self.writes
            .lock()
            .iter()
            .filter(|w| w.iter().all(|&b| b == 0))
            .count()
    }

    pub fn clear(&self) {
        self.writes.lock().clear();
    }
}

/// Playback device that records every write
#[derive(Default)]
pub struct RecordingPlayback {
    log: PlaybackLog,
    /// Writes to reject before accepting again
    failures: usize,
}

impl RecordingPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` writes with a stream error
    pub fn failing(n: usize) -> Self {
        Self {
            log: PlaybackLog::default(),
            failures: n,
        }
    }

    pub fn log(&self) -> PlaybackLog {
        self.log.clone()
    }
}

impl AudioPlaybackDevice for RecordingPlayback {
    fn write(&mut self, buf: &[u8], _timeout: Duration) -> Result<usize, AudioError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(AudioError::StreamError("scripted write failure".into()));
        }
        self.log.writes.lock().push(buf.to_vec());
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_then_timeouts() {
        let mut capture = ScriptedCapture::new([
            CaptureStep::Frame(vec![1, 2, 3, 4]),
            CaptureStep::Fail("boom".into()),
        ]);
        let reads = capture.read_counter();
        let mut buf = [0u8; 2];

        assert_eq!(capture.read(&mut buf, Duration::ZERO).unwrap(), CaptureRead::Filled(2));
        assert_eq!(buf, [1, 2]);
        assert!(capture.read(&mut buf, Duration::ZERO).is_err());
        assert_eq!(capture.read(&mut buf, Duration::ZERO).unwrap(), CaptureRead::TimedOut);
        assert_eq!(reads.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_recording_playback() {
        let mut playback = RecordingPlayback::failing(1);
        let log = playback.log();

        assert!(playback.write(&[1, 1], Duration::ZERO).is_err());
        assert_eq!(playback.write(&[0, 0], Duration::ZERO).unwrap(), 2);
        assert_eq!(playback.write(&[5, 0], Duration::ZERO).unwrap(), 2);

        assert_eq!(log.len(), 2);
        assert_eq!(log.silent_writes(), 1);
    }
}
