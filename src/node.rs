//! Node startup and supervision
//!
//! Startup order: control flags, audio devices, sockets, then the two lanes
//! on their own threads, then the input and display tasks. A failure before
//! the lanes start is fatal. After that nothing short of shutdown stops them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::{AudioCaptureDevice, AudioPlaybackDevice, SharedSampleRing};
use crate::clock::Clock;
use crate::error::Result;
use crate::lane::receive::ReceiveStatsSnapshot;
use crate::lane::transmit::TransmitStatsSnapshot;
use crate::lane::{CaptureTransmitLane, ReceivePlaybackLane, ReceiveStats, TransmitStats};
use crate::network::DatagramTransport;

/// Overflow and underrun counts of the audio device rings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStatsSnapshot {
    /// Captured samples dropped because the transmit lane fell behind
    pub capture_overflows: usize,
    /// Output samples played as silence because nothing was queued
    pub playback_underruns: usize,
}

/// Counters from both lanes, plus the device rings when attached
#[derive(Debug, Clone)]
pub struct LinkStats {
    transmit: Arc<TransmitStats>,
    receive: Arc<ReceiveStats>,
    device_rings: Option<(SharedSampleRing, SharedSampleRing)>,
}

impl LinkStats {
    pub fn new(transmit: Arc<TransmitStats>, receive: Arc<ReceiveStats>) -> Self {
        Self {
            transmit,
            receive,
            device_rings: None,
        }
    }

    /// Also report the rings between the lanes and the audio callbacks
    pub fn with_device_rings(mut self, capture: SharedSampleRing, playback: SharedSampleRing) -> Self {
        self.device_rings = Some((capture, playback));
        self
    }

    pub fn transmit(&self) -> TransmitStatsSnapshot {
        self.transmit.snapshot()
    }

    pub fn receive(&self) -> ReceiveStatsSnapshot {
        self.receive.snapshot()
    }

    pub fn devices(&self) -> Option<DeviceStatsSnapshot> {
        self.device_rings
            .as_ref()
            .map(|(capture, playback)| DeviceStatsSnapshot {
                capture_overflows: capture.overflow_count(),
                playback_underruns: playback.underrun_count(),
            })
    }

    pub fn log(&self) {
        let tx = self.transmit();
        let rx = self.receive();
        tracing::info!(
            "Transmit stats: {} captured, {} sent, {} bytes, {} capture timeouts, {} capture errors, {} encrypt errors, {} send errors",
            tx.frames_captured,
            tx.frames_sent,
            tx.bytes_sent,
            tx.capture_timeouts,
            tx.capture_errors,
            tx.encrypt_errors,
            tx.send_errors
        );
        tracing::info!(
            "Receive stats: {} datagrams, {} bytes, {} played, {} silence flushes, {} rejected, {} playback errors",
            rx.datagrams_received,
            rx.bytes_received,
            rx.frames_played,
            rx.silence_flushes,
            rx.cipher_rejects,
            rx.playback_errors
        );
        if let Some(dev) = self.devices() {
            tracing::info!(
                "Device stats: {} capture overflows, {} playback underruns",
                dev.capture_overflows,
                dev.playback_underruns
            );
        }
    }
}

/// Running lane threads
pub struct LaneHandles {
    running: Arc<AtomicBool>,
    transmit: JoinHandle<()>,
    receive: JoinHandle<()>,
    stats: LinkStats,
}

impl LaneHandles {
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Ask both lanes to stop and wait for them. Each lane notices within
    /// one receive or capture timeout.
    pub fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        if self.transmit.join().is_err() {
            tracing::error!("Transmit lane panicked");
        }
        if self.receive.join().is_err() {
            tracing::error!("Receive lane panicked");
        }
    }
}

/// Start both lanes on dedicated threads
pub fn spawn_lanes<C, TT, P, RT, K>(
    transmit: CaptureTransmitLane<C, TT>,
    receive: ReceivePlaybackLane<P, RT, K>,
) -> Result<LaneHandles>
where
    C: AudioCaptureDevice + 'static,
    TT: DatagramTransport + 'static,
    P: AudioPlaybackDevice + 'static,
    RT: DatagramTransport + 'static,
    K: Clock + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let stats = LinkStats::new(transmit.stats(), receive.stats());

    let rx_running = running.clone();
    let receive = thread::Builder::new()
        .name("rx-lane".into())
        .spawn(move || receive.run(rx_running))?;

    let tx_running = running.clone();
    let transmit = match thread::Builder::new()
        .name("tx-lane".into())
        .spawn(move || transmit.run(tx_running))
    {
        Ok(handle) => handle,
        Err(e) => {
            running.store(false, Ordering::Relaxed);
            let _ = receive.join();
            return Err(e.into());
        }
    };

    Ok(LaneHandles {
        running,
        transmit,
        receive,
        stats,
    })
}

#[cfg(feature = "audio-io")]
pub use runtime::run;

#[cfg(feature = "audio-io")]
mod runtime {
    use std::time::Instant;

    use tokio::time::{interval, MissedTickBehavior};

    use super::*;
    use crate::audio::{resolve_device, CpalCapture, CpalPlayback, Direction};
    use crate::config::AppConfig;
    use crate::constants::STATS_LOG_INTERVAL;
    use crate::control::ControlState;
    use crate::display::{LogStatusSink, StatusBoard};
    use crate::input::{spawn_console_reader, ConsoleButtons, InputPoller};
    use crate::lane::{ReceiveLaneConfig, TransmitLaneConfig};
    use crate::network::UdpTransport;

    /// Run a node until ctrl-c
    pub async fn run(config: AppConfig) -> Result<()> {
        config.validate()?;

        let control = Arc::new(ControlState::from_config(&config.control));
        let peer = config.peer_endpoint();
        let listen = config.listen_endpoint();
        tracing::info!(
            role = config.role.label(),
            %peer,
            %listen,
            encryption = control.encryption_enabled(),
            "Starting walkie-talkie node"
        );

        // Audio devices
        let samples_per_frame = config.audio.samples_per_frame();
        let ring_samples = samples_per_frame * config.audio.playback_queue_frames;

        let input = resolve_device(Direction::Input, config.audio.input_device.as_deref())?;
        tracing::info!("Input device: {}", input.name);
        let capture = CpalCapture::open(input, config.audio.sample_rate, ring_samples)?;

        let output = resolve_device(Direction::Output, config.audio.output_device.as_deref())?;
        tracing::info!("Output device: {}", output.name);
        let playback = CpalPlayback::open(output, config.audio.sample_rate, ring_samples)?;
        let (capture_ring, playback_ring) = (capture.ring(), playback.ring());

        // Sockets
        let rx_transport = UdpTransport::bind_receiver(
            listen,
            peer,
            config.receive_timeout(),
            config.network.socket_buffer_bytes,
        )?;
        let tx_transport = UdpTransport::bind_sender(peer, config.network.socket_buffer_bytes)?;
        tracing::info!("UDP link ready: listening on {}, sending to {}", listen, peer);

        let transmit = CaptureTransmitLane::new(
            capture,
            tx_transport,
            control.clone(),
            TransmitLaneConfig::from_app_config(&config),
        );
        let receive = ReceivePlaybackLane::new(
            playback,
            rx_transport,
            control.clone(),
            ReceiveLaneConfig::from_app_config(&config),
        );
        let lanes = spawn_lanes(transmit, receive)?;

        // Console stands in for the physical buttons
        let buttons = Arc::new(ConsoleButtons::new());
        spawn_console_reader(buttons.clone())?;

        let mut poller = InputPoller::new(buttons, control.clone());
        let poll_interval = config.poll_interval();
        let input_task = tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                poller.poll();
            }
        });

        let mut board = StatusBoard::new(LogStatusSink, control.clone(), config.role);
        let stats = lanes
            .stats()
            .clone()
            .with_device_rings(capture_ring, playback_ring);
        let refresh = config.display_refresh();
        let display_task = tokio::spawn(async move {
            let mut ticker = interval(refresh);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_stats = Instant::now();
            loop {
                ticker.tick().await;
                board.refresh();
                if last_stats.elapsed() >= STATS_LOG_INTERVAL {
                    last_stats = Instant::now();
                    stats.log();
                }
            }
        });

        tracing::info!("Type 'ptt' to toggle push-to-talk, 'enc' to toggle encryption, ctrl-c to quit");

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutting down");

        input_task.abort();
        display_task.abort();
        control.set_transmit_enabled(false);

        match tokio::task::spawn_blocking(move || lanes.stop()).await {
            Ok(()) => {}
            Err(e) => tracing::error!(error = %e, "Lane shutdown failed"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::audio::buffer::create_shared_ring;
    use crate::audio::memory::{RecordingPlayback, ScriptedCapture};
    use crate::config::AppConfig;
    use crate::control::ControlState;
    use crate::lane::{ReceiveLaneConfig, TransmitLaneConfig};
    use crate::network::LoopbackTransport;

    #[test]
    fn test_spawned_lanes_move_audio_and_stop() {
        let mut config = AppConfig::default();
        config.audio.frame_bytes = 64;
        config.network.receive_timeout_ms = 5;
        config.transmit.yield_ms = 1;

        let control = Arc::new(ControlState::new(true, true));
        let (tx_transport, rx_transport) = LoopbackTransport::pair(Duration::from_millis(5));

        let capture = ScriptedCapture::repeating(vec![1u8; 64]);
        let playback = RecordingPlayback::new();
        let log = playback.log();

        let transmit = CaptureTransmitLane::new(
            capture,
            tx_transport,
            control.clone(),
            TransmitLaneConfig::from_app_config(&config),
        );
        let receive = ReceivePlaybackLane::new(
            playback,
            rx_transport,
            control.clone(),
            ReceiveLaneConfig::from_app_config(&config),
        );

        let lanes = spawn_lanes(transmit, receive).unwrap();
        assert!(lanes.is_running());

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while lanes.stats().receive().frames_played < 3 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        let stats = lanes.stats().clone();
        lanes.stop();

        assert!(stats.transmit().frames_sent >= 3);
        assert!(stats.receive().frames_played >= 3);
        assert_eq!(stats.receive().cipher_rejects, 0);
        assert!(log.writes().iter().any(|w| w.len() == 64 && w.iter().any(|&b| b != 0)));
        assert_eq!(stats.devices(), None);
    }

    #[test]
    fn test_stats_report_device_ring_counters() {
        let stats = LinkStats::new(Arc::new(TransmitStats::default()), Arc::new(ReceiveStats::default()));
        let capture = create_shared_ring(2);
        let playback = create_shared_ring(2);
        let stats = stats.with_device_rings(capture.clone(), playback.clone());

        assert_eq!(stats.devices(), Some(DeviceStatsSnapshot::default()));

        // Lane fell behind the microphone
        for s in 0..5 {
            capture.push(s);
        }
        // Speaker drained an empty queue
        assert_eq!(playback.pop(), None);
        assert_eq!(playback.pop(), None);

        assert_eq!(
            stats.devices(),
            Some(DeviceStatsSnapshot {
                capture_overflows: 3,
                playback_underruns: 2,
            })
        );
        stats.log();
    }
}
