//! In-place signal conditioning for 16-bit PCM frames
//!
//! Applied on the capture side before encryption: a fixed gain with
//! saturation, then an optional one-pole high-pass stage.

use crate::audio::frame::map_samples_in_place;
use crate::config::ConditioningConfig;

/// Scale one sample, saturating at the i16 range instead of wrapping
#[inline]
pub fn amplify_sample(sample: i16, gain: f32) -> i16 {
    (sample as f32 * gain).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Apply `gain` to every sample of a little-endian PCM buffer
pub fn amplify(pcm: &mut [u8], gain: f32) {
    map_samples_in_place(pcm, |s| amplify_sample(s, gain));
}

/// One-pole high-pass stage
///
/// `y[i] = alpha * (x[i] - x[i-1]) + y[i-1]`, seeded with `y[0] = x[0]` at
/// the start of every frame. No state carries over between frames.
#[derive(Debug, Clone, Copy)]
pub struct HighPassFilter {
    alpha: f32,
}

impl HighPassFilter {
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }

    pub fn process(&self, pcm: &mut [u8]) {
        let mut prev_in: Option<i16> = None;
        let mut prev_out = 0.0f32;
        let alpha = self.alpha;

        map_samples_in_place(pcm, |x| match prev_in.replace(x) {
            None => {
                prev_out = x as f32;
                x
            }
            Some(px) => {
                prev_out += alpha * (x as f32 - px as f32);
                prev_out.clamp(i16::MIN as f32, i16::MAX as f32) as i16
            }
        });
    }
}

/// Gain followed by an optional high-pass, both in place
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    gain: f32,
    high_pass: Option<HighPassFilter>,
}

impl SignalConditioner {
    pub fn new(gain: f32) -> Self {
        Self {
            gain,
            high_pass: None,
        }
    }

    pub fn from_config(config: &ConditioningConfig) -> Self {
        Self {
            gain: config.gain,
            high_pass: config
                .high_pass
                .then(|| HighPassFilter::new(config.high_pass_alpha)),
        }
    }

    pub fn with_high_pass(mut self, alpha: f32) -> Self {
        self.high_pass = Some(HighPassFilter::new(alpha));
        self
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn high_pass_enabled(&self) -> bool {
        self.high_pass.is_some()
    }

    pub fn process(&self, pcm: &mut [u8]) {
        amplify(pcm, self.gain);
        if let Some(filter) = &self.high_pass {
            filter.process(pcm);
        }
    }
}

impl Default for SignalConditioner {
    fn default() -> Self {
        Self::from_config(&ConditioningConfig::default())
    }
}
