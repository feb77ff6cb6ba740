//! Audio capture from input devices
//!
//! The cpal input callback runs on a dedicated thread and pushes samples into
//! a lock-free ring; the transmit lane pulls whole frames out of the ring with
//! a bounded wait.

use std::thread;
use std::time::{Duration, Instant};

use crate::audio::buffer::SharedSampleRing;
use crate::audio::{AudioCaptureDevice, CaptureRead};
use crate::constants::BYTES_PER_SAMPLE;
use crate::error::AudioError;

/// How often a blocked read re-checks the ring
const READ_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Blocking reader over a sample ring filled by some producer
pub struct RingCapture {
    ring: SharedSampleRing,
}

impl RingCapture {
    pub fn new(ring: SharedSampleRing) -> Self {
        Self { ring }
    }

    pub fn ring(&self) -> &SharedSampleRing {
        &self.ring
    }
}

impl AudioCaptureDevice for RingCapture {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<CaptureRead, AudioError> {
        let wanted = buf.len() / BYTES_PER_SAMPLE;
        if wanted == 0 {
            return Ok(CaptureRead::Filled(0));
        }

        let deadline = Instant::now() + timeout;
        loop {
            // Only consume once a whole frame is there, so a timeout never
            // throws away a partial frame
            if self.ring.len() >= wanted {
                let n = self.ring.pop_pcm_into(&mut buf[..wanted * BYTES_PER_SAMPLE]);
                return Ok(CaptureRead::Filled(n));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(CaptureRead::TimedOut);
            }
            thread::sleep(READ_POLL_INTERVAL.min(deadline - now));
        }
    }
}

#[cfg(feature = "audio-io")]
pub use cpal_backend::CpalCapture;

#[cfg(feature = "audio-io")]
mod cpal_backend {
    use cpal::traits::{DeviceTrait, StreamTrait};
    use cpal::StreamConfig;
    use crossbeam_channel::{bounded, Receiver};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use super::RingCapture;
    use crate::audio::buffer::{create_shared_ring, SharedSampleRing};
    use crate::audio::device::AudioDevice;
    use crate::audio::{AudioCaptureDevice, CaptureRead};
    use crate::error::AudioError;

    /// Capture from a cpal input device, downmixed to mono i16
    pub struct CpalCapture {
        reader: RingCapture,

        /// Whether the stream thread should keep running
        running: Arc<AtomicBool>,

        /// Stream thread handle
        thread_handle: Option<JoinHandle<()>>,

        /// Channel for stream errors
        error_rx: Receiver<AudioError>,
    }

    impl CpalCapture {
        /// Open `device` and start streaming into a ring of `ring_samples`
        pub fn open(
            device: AudioDevice,
            sample_rate: u32,
            ring_samples: usize,
        ) -> Result<Self, AudioError> {
            let default_config = device.default_config()?;
            let config = StreamConfig {
                channels: default_config.channels(),
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let ring = create_shared_ring(ring_samples);
            let running = Arc::new(AtomicBool::new(true));
            let (error_tx, error_rx) = bounded::<AudioError>(16);
            let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

            let running_for_loop = running.clone();
            let ring_for_callback = ring.clone();
            let stream_config = config.clone();
            let channels = config.channels as usize;
            let name = device.name.clone();

            let handle = thread::Builder::new()
                .name("audio-capture".into())
                .spawn(move || {
                    let cpal_device = device.into_inner();

                    let stream = cpal_device.build_input_stream(
                        &stream_config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            // Keep the first channel of each interleaved frame
                            for frame in data.chunks(channels) {
                                let sample = (frame[0].clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                                ring_for_callback.push(sample);
                            }
                        },
                        move |err| {
                            let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
                        },
                        None,
                    );

                    let stream = match stream {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e.into()));
                            return;
                        }
                    };
                    if let Err(e) = stream.play() {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                    let _ = ready_tx.send(Ok(()));

                    // Keep thread alive while running
                    while running_for_loop.load(Ordering::Relaxed) {
                        thread::sleep(Duration::from_millis(10));
                    }

                    // Stream is dropped here, stopping capture
                })
                .map_err(|e| AudioError::StreamError(e.to_string()))?;

            ready_rx
                .recv_timeout(Duration::from_secs(5))
                .map_err(|_| AudioError::StreamError("capture stream did not start".into()))??;

            tracing::info!(
                device = %name,
                sample_rate,
                channels = config.channels,
                "Audio capture started"
            );

            Ok(Self {
                reader: RingCapture::new(ring),
                running,
                thread_handle: Some(handle),
                error_rx,
            })
        }

        /// Stop capturing audio
        pub fn stop(&mut self) {
            self.running.store(false, Ordering::SeqCst);

            if let Some(handle) = self.thread_handle.take() {
                let _ = handle.join();
            }
        }

        pub fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        /// Handle to the capture ring, whose overflow count is the
        /// samples dropped because the lane fell behind
        pub fn ring(&self) -> SharedSampleRing {
            self.reader.ring().clone()
        }
    }

    impl AudioCaptureDevice for CpalCapture {
        fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<CaptureRead, AudioError> {
            if !self.is_running() {
                return Err(AudioError::Closed);
            }
            if let Ok(err) = self.error_rx.try_recv() {
                return Err(err);
            }
            self.reader.read(buf, timeout)
        }
    }

    impl Drop for CpalCapture {
        fn drop(&mut self) {
            self.stop();
        }
    }
}
