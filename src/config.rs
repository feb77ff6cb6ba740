//! Runtime configuration
//!
//! Role, peer endpoint, key material and timing are read from a TOML file at
//! startup, so both ends of the link run the same build.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cipher::CipherKey;
use crate::constants::*;
use crate::error::{Error, Result};

/// Which side of the link this node is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Access-point side, 192.168.4.1
    #[default]
    Server,
    /// Station side, 192.168.4.2
    Client,
}

impl Role {
    /// Address this role expects its peer at
    pub fn default_peer_ip(self) -> Ipv4Addr {
        match self {
            Role::Server => Ipv4Addr::new(192, 168, 4, 2),
            Role::Client => Ipv4Addr::new(192, 168, 4, 1),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Server => "SERVER",
            Role::Client => "CLIENT",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(Role::Server),
            "client" => Ok(Role::Client),
            other => Err(Error::Config(format!("unknown role '{}'", other))),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub role: Role,
    pub network: NetworkConfig,
    pub audio: AudioConfig,
    pub cipher: CipherConfig,
    pub conditioning: ConditioningConfig,
    pub transmit: TransmitConfig,
    pub receive: ReceiveConfig,
    pub control: ControlConfig,
}

/// Datagram transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Port bound by the receive lane and targeted on the peer
    pub port: u16,
    /// Overrides the role's default peer address
    pub peer: Option<SocketAddr>,
    /// Local address for the receive socket
    pub bind_ip: Ipv4Addr,
    pub receive_timeout_ms: u64,
    /// SO_RCVBUF / SO_SNDBUF; 0 keeps the OS default
    pub socket_buffer_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_UDP_PORT,
            peer: None,
            bind_ip: Ipv4Addr::UNSPECIFIED,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT.as_millis() as u64,
            socket_buffer_bytes: 0,
        }
    }
}

/// Capture and playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub frame_bytes: usize,
    pub capture_timeout_ms: u64,
    pub playback_timeout_ms: u64,
    /// Frames the playback queue holds ahead of the device
    pub playback_queue_frames: usize,
    /// cpal device id, e.g. `input:USB Microphone`; host default when unset
    pub input_device: Option<String>,
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_bytes: DEFAULT_FRAME_BYTES,
            capture_timeout_ms: DEFAULT_CAPTURE_TIMEOUT.as_millis() as u64,
            playback_timeout_ms: DEFAULT_PLAYBACK_TIMEOUT.as_millis() as u64,
            playback_queue_frames: DEFAULT_PLAYBACK_QUEUE_FRAMES,
            input_device: None,
            output_device: None,
        }
    }
}

impl AudioConfig {
    pub fn samples_per_frame(&self) -> usize {
        self.frame_bytes / BYTES_PER_SAMPLE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    pub key: [u8; 16],
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_CIPHER_KEY,
        }
    }
}

impl CipherConfig {
    pub fn key(&self) -> CipherKey {
        CipherKey::new(self.key)
    }
}

/// Capture-side signal conditioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditioningConfig {
    pub gain: f32,
    pub high_pass: bool,
    pub high_pass_alpha: f32,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            gain: DEFAULT_GAIN,
            high_pass: false,
            high_pass_alpha: DEFAULT_HIGH_PASS_ALPHA,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitConfig {
    pub yield_ms: u64,
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            yield_ms: DEFAULT_TRANSMIT_YIELD.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveConfig {
    pub silence_threshold_ms: u64,
    pub flush_frames: usize,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            silence_threshold_ms: DEFAULT_SILENCE_THRESHOLD.as_millis() as u64,
            flush_frames: DEFAULT_FLUSH_FRAMES,
        }
    }
}

/// Initial flag values and collaborator cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub encryption_on_start: bool,
    /// Transmit without holding push-to-talk
    pub transmit_on_start: bool,
    pub poll_interval_ms: u64,
    pub display_refresh_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            encryption_on_start: true,
            transmit_on_start: false,
            poll_interval_ms: DEFAULT_INPUT_POLL.as_millis() as u64,
            display_refresh_ms: DEFAULT_DISPLAY_REFRESH.as_millis() as u64,
        }
    }
}

impl AppConfig {
    /// Defaults for `role`
    pub fn for_role(role: Role) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "walkie-link")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load `path` if given, else the default location if it exists, else
    /// built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Where the transmit lane sends
    pub fn peer_endpoint(&self) -> SocketAddr {
        self.network.peer.unwrap_or_else(|| {
            SocketAddr::V4(SocketAddrV4::new(
                self.role.default_peer_ip(),
                self.network.port,
            ))
        })
    }

    /// Where the receive lane listens
    pub fn listen_endpoint(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.network.bind_ip, self.network.port))
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.network.receive_timeout_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.audio.capture_timeout_ms)
    }

    pub fn playback_timeout(&self) -> Duration {
        Duration::from_millis(self.audio.playback_timeout_ms)
    }

    pub fn transmit_yield(&self) -> Duration {
        Duration::from_millis(self.transmit.yield_ms)
    }

    pub fn silence_threshold(&self) -> Duration {
        Duration::from_millis(self.receive.silence_threshold_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.control.poll_interval_ms)
    }

    pub fn display_refresh(&self) -> Duration {
        Duration::from_millis(self.control.display_refresh_ms)
    }

    /// Reject settings the lanes cannot run with
    pub fn validate(&self) -> Result<()> {
        let frame_bytes = self.audio.frame_bytes;
        if frame_bytes == 0 || frame_bytes % CIPHER_BLOCK_SIZE != 0 {
            return Err(Error::Config(format!(
                "audio.frame_bytes must be a positive multiple of {}, got {}",
                CIPHER_BLOCK_SIZE, frame_bytes
            )));
        }
        if frame_bytes > MAX_DATAGRAM_PAYLOAD {
            return Err(Error::Config(format!(
                "audio.frame_bytes {} exceeds the {}-byte datagram limit",
                frame_bytes, MAX_DATAGRAM_PAYLOAD
            )));
        }
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("audio.sample_rate must be non-zero".into()));
        }
        if self.audio.playback_queue_frames == 0 {
            return Err(Error::Config(
                "audio.playback_queue_frames must be non-zero".into(),
            ));
        }

        let gain = self.conditioning.gain;
        if !gain.is_finite() || gain < 0.0 {
            return Err(Error::Config(format!(
                "conditioning.gain must be finite and non-negative, got {}",
                gain
            )));
        }
        let alpha = self.conditioning.high_pass_alpha;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::Config(format!(
                "conditioning.high_pass_alpha must be within [0, 1], got {}",
                alpha
            )));
        }

        for (name, ms) in [
            ("network.receive_timeout_ms", self.network.receive_timeout_ms),
            ("audio.capture_timeout_ms", self.audio.capture_timeout_ms),
            ("audio.playback_timeout_ms", self.audio.playback_timeout_ms),
            ("receive.silence_threshold_ms", self.receive.silence_threshold_ms),
            ("control.poll_interval_ms", self.control.poll_interval_ms),
            ("control.display_refresh_ms", self.control.display_refresh_ms),
            ("transmit.yield_ms", self.transmit.yield_ms),
        ] {
            if ms == 0 {
                return Err(Error::Config(format!("{} must be non-zero", name)));
            }
        }

        if self.receive.flush_frames == 0 {
            return Err(Error::Config(
                "receive.flush_frames must be at least 1".into(),
            ));
        }

        if self.network.port == 0 {
            return Err(Error::Config("network.port must be non-zero".into()));
        }

        Ok(())
    }
}
