//! Audio device enumeration and lookup
//!
//! Devices are addressed by `input:<name>` or `output:<name>`, the same id
//! `--list-devices` prints.

use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::AudioError;

/// Rates checked when summarising a device
const CANDIDATE_RATES: [u32; 4] = [16_000, 22_050, 44_100, 48_000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }

    fn from_id(id: &str) -> Option<(Self, &str)> {
        let (prefix, name) = id.split_once(':')?;
        match prefix {
            "input" => Some((Direction::Input, name)),
            "output" => Some((Direction::Output, name)),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

fn device_id(direction: Direction, name: &str) -> String {
    format!("{}:{}", direction.prefix(), name)
}

/// Summary of one host audio device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDeviceInfo {
    pub id: String,
    pub name: String,
    pub direction: Direction,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// A cpal device opened for one direction
pub struct AudioDevice {
    inner: cpal::Device,
    pub name: String,
    pub direction: Direction,
}

impl AudioDevice {
    fn new(inner: cpal::Device, direction: Direction) -> Self {
        let name = inner.name().unwrap_or_else(|_| "Unknown".to_string());
        Self {
            inner,
            name,
            direction,
        }
    }

    pub fn id(&self) -> String {
        device_id(self.direction, &self.name)
    }

    pub fn into_inner(self) -> cpal::Device {
        self.inner
    }

    /// The host's preferred stream config for this device's direction
    pub fn default_config(&self) -> Result<cpal::SupportedStreamConfig, AudioError> {
        let config = match self.direction {
            Direction::Input => self.inner.default_input_config(),
            Direction::Output => self.inner.default_output_config(),
        };
        Ok(config?)
    }
}

fn host_devices(host: &cpal::Host, direction: Direction) -> Vec<cpal::Device> {
    let devices = match direction {
        Direction::Input => host.input_devices().map(|d| d.collect()),
        Direction::Output => host.output_devices().map(|d| d.collect()),
    };
    devices.unwrap_or_else(|e| {
        tracing::warn!(%direction, error = %e, "Failed to enumerate devices");
        Vec::new()
    })
}

fn host_default(host: &cpal::Host, direction: Direction) -> Option<cpal::Device> {
    match direction {
        Direction::Input => host.default_input_device(),
        Direction::Output => host.default_output_device(),
    }
}

/// Every input and output device the default host exposes
pub fn list_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    for direction in [Direction::Input, Direction::Output] {
        let default_name = host_default(&host, direction).and_then(|d| d.name().ok());
        for device in host_devices(&host, direction) {
            let Ok(name) = device.name() else { continue };
            let (sample_rates, channels) = capabilities(&device, direction);
            devices.push(AudioDeviceInfo {
                id: device_id(direction, &name),
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                direction,
                sample_rates,
                channels,
            });
        }
    }

    devices
}

/// Candidate rates and channel counts the device advertises
fn capabilities(device: &cpal::Device, direction: Direction) -> (Vec<u32>, Vec<u16>) {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = match direction {
        Direction::Input => device.supported_input_configs().map(|r| r.collect()),
        Direction::Output => device.supported_output_configs().map(|r| r.collect()),
    }
    .unwrap_or_default();

    let mut sample_rates: Vec<u32> = CANDIDATE_RATES
        .into_iter()
        .filter(|&rate| {
            ranges.iter().any(|range| {
                let rate = cpal::SampleRate(rate);
                rate >= range.min_sample_rate() && rate <= range.max_sample_rate()
            })
        })
        .collect();
    let mut channels: Vec<u16> = ranges.iter().map(|range| range.channels()).collect();

    sample_rates.dedup();
    channels.sort_unstable();
    channels.dedup();
    (sample_rates, channels)
}

/// Look a device up by id
pub fn get_device_by_id(id: &str) -> Result<AudioDevice, AudioError> {
    let (direction, name) =
        Direction::from_id(id).ok_or_else(|| AudioError::DeviceNotFound(id.to_string()))?;

    let host = cpal::default_host();
    host_devices(&host, direction)
        .into_iter()
        .find(|device| device.name().map(|n| n == name).unwrap_or(false))
        .map(|device| AudioDevice::new(device, direction))
        .ok_or_else(|| AudioError::DeviceNotFound(id.to_string()))
}

/// Configured device for `direction`, or the host default when unset
pub fn resolve_device(direction: Direction, id: Option<&str>) -> Result<AudioDevice, AudioError> {
    let device = match id {
        Some(id) => get_device_by_id(id)?,
        None => {
            let host = cpal::default_host();
            let device = host_default(&host, direction).ok_or_else(|| {
                AudioError::DeviceNotFound(format!("no default {} device", direction))
            })?;
            AudioDevice::new(device, direction)
        }
    };

    if device.direction != direction {
        return Err(AudioError::DeviceNotFound(format!(
            "{} is not an {} device",
            device.id(),
            direction
        )));
    }
    Ok(device)
}
