//! Audio playback to output devices
//!
//! The receive lane queues PCM into a lock-free ring; the cpal output
//! callback drains it and plays zeros on underrun.

use std::thread;
use std::time::{Duration, Instant};

use crate::audio::buffer::SharedSampleRing;
use crate::audio::AudioPlaybackDevice;
use crate::constants::BYTES_PER_SAMPLE;
use crate::error::AudioError;

const WRITE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Blocking writer into a sample ring drained by some consumer
pub struct RingPlayback {
    ring: SharedSampleRing,
}

impl RingPlayback {
    pub fn new(ring: SharedSampleRing) -> Self {
        Self { ring }
    }

    pub fn ring(&self) -> &SharedSampleRing {
        &self.ring
    }
}

impl AudioPlaybackDevice for RingPlayback {
    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, AudioError> {
        if buf.len() % BYTES_PER_SAMPLE != 0 {
            return Err(AudioError::OddLength(buf.len()));
        }

        let started = Instant::now();
        let deadline = started + timeout;
        let mut written = 0;
        loop {
            written += self.ring.push_pcm(&buf[written..]);
            if written == buf.len() {
                return Ok(written);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(AudioError::WriteTimeout {
                    written,
                    waited: now - started,
                });
            }
            thread::sleep(WRITE_POLL_INTERVAL.min(deadline - now));
        }
    }
}

#[cfg(feature = "audio-io")]
pub use cpal_backend::CpalPlayback;

#[cfg(feature = "audio-io")]
mod cpal_backend {
    use cpal::traits::{DeviceTrait, StreamTrait};
    use cpal::StreamConfig;
    use crossbeam_channel::{bounded, Receiver};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use super::RingPlayback;
    use crate::audio::buffer::{create_shared_ring, SharedSampleRing};
    use crate::audio::device::AudioDevice;
    use crate::audio::AudioPlaybackDevice;
    use crate::error::AudioError;

    /// Playback on a cpal output device; mono is copied to every channel
    pub struct CpalPlayback {
        writer: RingPlayback,
        running: Arc<AtomicBool>,
        thread_handle: Option<JoinHandle<()>>,
        error_rx: Receiver<AudioError>,
    }

    impl CpalPlayback {
        /// Open `device` and start draining a ring of `ring_samples`
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
                .name("audio-playback".into())
                .spawn(move || {
                    let cpal_device = device.into_inner();

                    let stream = cpal_device.build_output_stream(
                        &stream_config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            for frame in data.chunks_mut(channels) {
                                let value = match ring_for_callback.pop() {
                                    Some(s) => s as f32 / i16::MAX as f32,
                                    None => 0.0,
                                };
                                frame.fill(value);
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

                    while running_for_loop.load(Ordering::Relaxed) {
                        thread::sleep(Duration::from_millis(10));
                    }
                })
                .map_err(|e| AudioError::StreamError(e.to_string()))?;

            ready_rx
                .recv_timeout(Duration::from_secs(5))
                .map_err(|_| AudioError::StreamError("playback stream did not start".into()))??;

            tracing::info!(
                device = %name,
                sample_rate,
                channels = config.channels,
                "Audio playback started"
            );

            Ok(Self {
                writer: RingPlayback::new(ring),
                running,
                thread_handle: Some(handle),
                error_rx,
            })
        }

        pub fn stop(&mut self) {
            self.running.store(false, Ordering::SeqCst);

            if let Some(handle) = self.thread_handle.take() {
                let _ = handle.join();
            }
        }

        pub fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        /// Handle to the playback ring. Its underrun count is the output
        /// samples played as silence because the queue was empty.
        pub fn ring(&self) -> SharedSampleRing {
            self.writer.ring().clone()
        }
    }

    impl AudioPlaybackDevice for CpalPlayback {
        fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, AudioError> {
            if !self.is_running() {
                return Err(AudioError::Closed);
            }
            if let Ok(err) = self.error_rx.try_recv() {
                return Err(err);
            }
            self.writer.write(buf, timeout)
        }
    }

    impl Drop for CpalPlayback {
        fn drop(&mut self) {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::create_shared_ring;
    use crate::audio::frame::pcm_from_samples;

    #[test]
    fn test_write_fits() {
        let ring = create_shared_ring(16);
        let mut playback = RingPlayback::new(ring.clone());

        let pcm = pcm_from_samples(&[1, 2, 3]);
        assert_eq!(playback.write(&pcm, Duration::from_millis(5)).unwrap(), 6);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_write_times_out_when_full() {
        let ring = create_shared_ring(2);
        let mut playback = RingPlayback::new(ring);

        let pcm = pcm_from_samples(&[1, 2, 3, 4]);
        match playback.write(&pcm, Duration::from_millis(10)) {
            Err(AudioError::WriteTimeout { written, .. }) => assert_eq!(written, 4),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_write_resumes_when_drained() {
        let ring = create_shared_ring(2);
        let consumer = ring.clone();
        let mut playback = RingPlayback::new(ring);

        let handle = thread::spawn(move || {
            let mut drained = 0;
            while drained < 4 {
                if consumer.pop().is_some() {
                    drained += 1;
                } else {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        });

        let pcm = pcm_from_samples(&[1, 2, 3, 4]);
        assert_eq!(playback.write(&pcm, Duration::from_secs(2)).unwrap(), 8);
        handle.join().unwrap();
    }

    #[test]
    fn test_odd_length_rejected() {
        let mut playback = RingPlayback::new(create_shared_ring(8));
        assert!(matches!(
            playback.write(&[0u8; 3], Duration::from_millis(1)),
            Err(AudioError::OddLength(3))
        ));
    }
}
