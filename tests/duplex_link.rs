//! End-to-end checks over real loopback UDP sockets

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use walkie_link::audio::frame::{pcm_from_samples, samples_from_pcm};
use walkie_link::audio::memory::{RecordingPlayback, ScriptedCapture};
use walkie_link::cipher::CipherKey;
use walkie_link::clock::ManualClock;
use walkie_link::constants::{DEFAULT_CIPHER_KEY, DEFAULT_FLUSH_FRAMES};
use walkie_link::control::ControlState;
use walkie_link::dsp::SignalConditioner;
use walkie_link::lane::{
    CaptureTransmitLane, ReceiveLaneConfig, ReceiveOutcome, ReceivePlaybackLane,
    TransmitLaneConfig, TransmitOutcome,
};
use walkie_link::network::UdpTransport;
use walkie_link::node::spawn_lanes;

const FRAME_BYTES: usize = 1024;

fn localhost() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn transmit_config() -> TransmitLaneConfig {
    TransmitLaneConfig {
        frame_bytes: FRAME_BYTES,
        capture_timeout: Duration::from_millis(50),
        yield_interval: Duration::from_millis(1),
        conditioner: SignalConditioner::new(10.0),
        key: CipherKey::new(DEFAULT_CIPHER_KEY),
    }
}

fn receive_config() -> ReceiveLaneConfig {
    ReceiveLaneConfig {
        frame_bytes: FRAME_BYTES,
        playback_timeout: Duration::from_millis(50),
        silence_threshold: Duration::from_millis(100),
        flush_frames: DEFAULT_FLUSH_FRAMES,
        key: CipherKey::new(DEFAULT_CIPHER_KEY),
        retry_delay: Duration::from_millis(20),
    }
}

/// Receiver socket on an ephemeral port plus a sender aimed at it
fn udp_pair(receive_timeout: Duration) -> (UdpTransport, UdpTransport) {
    let rx = UdpTransport::bind_receiver(localhost(), localhost(), receive_timeout, 0).unwrap();
    let target = rx.local_addr().unwrap();
    let tx = UdpTransport::bind_sender(target, 0).unwrap();
    (tx, rx)
}

fn constant_frame(value: i16) -> Vec<u8> {
    pcm_from_samples(&[value; FRAME_BYTES / 2])
}

#[test]
fn encrypted_frame_arrives_amplified_and_bit_exact() {
    let control = Arc::new(ControlState::new(true, true));
    let (tx_transport, rx_transport) = udp_pair(Duration::from_secs(2));

    let mut transmit = CaptureTransmitLane::new(
        ScriptedCapture::repeating(constant_frame(1000)),
        tx_transport,
        control.clone(),
        transmit_config(),
    );
    let playback = RecordingPlayback::new();
    let log = playback.log();
    let mut receive = ReceivePlaybackLane::with_clock(
        playback,
        rx_transport,
        control.clone(),
        receive_config(),
        ManualClock::new(),
    );

    assert_eq!(
        transmit.run_iteration(),
        TransmitOutcome::Sent {
            bytes: FRAME_BYTES,
            encrypted: true
        }
    );
    assert_eq!(
        receive.run_iteration(),
        ReceiveOutcome::Played {
            bytes: FRAME_BYTES,
            flushed: false
        }
    );
    assert!(control.receiving_active());

    let writes = log.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0], constant_frame(10_000));
}

#[test]
fn loud_input_is_clamped_not_wrapped() {
    let control = Arc::new(ControlState::new(true, true));
    let (tx_transport, rx_transport) = udp_pair(Duration::from_secs(2));

    let mut transmit = CaptureTransmitLane::new(
        ScriptedCapture::repeating(pcm_from_samples(
            &[5000i16, -5000].repeat(FRAME_BYTES / 4),
        )),
        tx_transport,
        control.clone(),
        transmit_config(),
    );
    let playback = RecordingPlayback::new();
    let log = playback.log();
    let mut receive = ReceivePlaybackLane::new(playback, rx_transport, control, receive_config());

    transmit.run_iteration();
    receive.run_iteration();

    let samples = samples_from_pcm(&log.writes()[0]);
    assert_eq!(samples.len(), FRAME_BYTES / 2);
    assert!(samples.chunks(2).all(|pair| pair == [i16::MAX, i16::MIN]));
}

#[test]
fn plaintext_link_when_both_ends_disable_encryption() {
    let control = Arc::new(ControlState::new(true, false));
    let (tx_transport, rx_transport) = udp_pair(Duration::from_secs(2));

    let mut transmit = CaptureTransmitLane::new(
        ScriptedCapture::repeating(constant_frame(-300)),
        tx_transport,
        control.clone(),
        transmit_config(),
    );
    let playback = RecordingPlayback::new();
    let log = playback.log();
    let mut receive = ReceivePlaybackLane::new(playback, rx_transport, control, receive_config());

    assert_eq!(
        transmit.run_iteration(),
        TransmitOutcome::Sent {
            bytes: FRAME_BYTES,
            encrypted: false
        }
    );
    receive.run_iteration();
    assert_eq!(log.writes()[0], constant_frame(-3000));
}

#[test]
fn receiving_is_independent_of_local_transmit() {
    // Local node is not talking; the peer is
    let local = Arc::new(ControlState::new(false, true));
    let remote = Arc::new(ControlState::new(true, true));
    let (tx_transport, rx_transport) = udp_pair(Duration::from_millis(20));

    let mut peer = CaptureTransmitLane::new(
        ScriptedCapture::repeating(constant_frame(100)),
        tx_transport,
        remote,
        transmit_config(),
    );
    let clock = ManualClock::new();
    let playback = RecordingPlayback::new();
    let log = playback.log();
    let mut receive = ReceivePlaybackLane::with_clock(
        playback,
        rx_transport,
        local.clone(),
        receive_config(),
        clock.clone(),
    );

    // Local push-to-talk flips between every receive step
    peer.run_iteration();
    local.set_transmit_enabled(true);
    assert!(matches!(receive.run_iteration(), ReceiveOutcome::Played { .. }));
    assert!(local.receiving_active());

    local.set_transmit_enabled(false);
    peer.run_iteration();
    assert!(matches!(receive.run_iteration(), ReceiveOutcome::Played { .. }));
    assert!(local.receiving_active());

    // Gap: first timeout inside the threshold, then past it
    local.set_transmit_enabled(true);
    clock.advance(Duration::from_millis(50));
    assert_eq!(receive.run_iteration(), ReceiveOutcome::Idle);
    assert!(!local.receiving_active());

    local.set_transmit_enabled(false);
    clock.advance(Duration::from_millis(51));
    assert_eq!(receive.run_iteration(), ReceiveOutcome::Flushed);

    // Transmit state never overwritten by the receive lane
    assert!(!local.transmit_enabled());
    local.set_transmit_enabled(true);
    peer.run_iteration();
    assert!(matches!(receive.run_iteration(), ReceiveOutcome::Played { .. }));
    assert!(local.transmit_enabled());

    let writes = log.writes();
    assert_eq!(writes.len(), 3 + DEFAULT_FLUSH_FRAMES);
    // Gain of 10 on the peer
    assert_eq!(writes[0], constant_frame(1000));
    assert_eq!(writes[1], constant_frame(1000));
    assert!(writes[2..2 + DEFAULT_FLUSH_FRAMES]
        .iter()
        .all(|w| w.len() == FRAME_BYTES && w.iter().all(|&b| b == 0)));
    assert_eq!(writes[2 + DEFAULT_FLUSH_FRAMES], constant_frame(1000));
}

#[test]
fn full_duplex_lanes_on_threads() {
    let a = Arc::new(ControlState::new(true, true));
    let b = Arc::new(ControlState::new(true, true));

    // a -> b and b -> a, each over its own socket pair
    let (a_tx, b_rx) = udp_pair(Duration::from_millis(20));
    let (b_tx, a_rx) = udp_pair(Duration::from_millis(20));

    let a_playback = RecordingPlayback::new();
    let a_log = a_playback.log();
    let b_playback = RecordingPlayback::new();
    let b_log = b_playback.log();

    let a_lanes = spawn_lanes(
        CaptureTransmitLane::new(
            ScriptedCapture::repeating(constant_frame(10)),
            a_tx,
            a.clone(),
            transmit_config(),
        ),
        ReceivePlaybackLane::new(a_playback, a_rx, a.clone(), receive_config()),
    )
    .unwrap();
    let b_lanes = spawn_lanes(
        CaptureTransmitLane::new(
            ScriptedCapture::repeating(constant_frame(20)),
            b_tx,
            b.clone(),
            transmit_config(),
        ),
        ReceivePlaybackLane::new(b_playback, b_rx, b.clone(), receive_config()),
    )
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while (a_lanes.stats().receive().frames_played < 5 || b_lanes.stats().receive().frames_played < 5)
        && Instant::now() < deadline
    {
        thread::sleep(Duration::from_millis(5));
    }

    a_lanes.stop();
    b_lanes.stop();

    // Each side hears the other, amplified
    assert!(a_log.writes().iter().any(|w| *w == constant_frame(200)));
    assert!(b_log.writes().iter().any(|w| *w == constant_frame(100)));
}
