//! # Tuner Configuration
//!
//! Every tunable of the pipeline lives in [`TunerConfig`]. Defaults describe a
//! 22.05 kHz mono input analysed in 4096-sample frames every 100 ms. The
//! struct is serde-friendly so it can be loaded from or written to JSON;
//! missing fields fall back to their defaults.

use crate::error::ConfigError;
use crate::harmonics::{HarmonicScope, DEFAULT_HARMONICS};
use crate::tuning::StringOrder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Input sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per analysis frame.
    pub frame_size: usize,

    /// Low-pass cutoff in Hz; must be below Nyquist.
    pub lowpass_cutoff_hz: f32,
    /// Butterworth order of the low-pass.
    pub lowpass_order: usize,

    /// Lower edge of the peak search band in Hz.
    pub min_freq: f32,
    /// Upper edge of the peak search band in Hz.
    pub max_freq: f32,
    /// Refine the peak between bins instead of reporting the bin centre.
    pub interpolate_peak: bool,

    /// Half-width of the in-tune window in cents.
    pub cents_tolerance: f32,
    /// Minimum magnitude regardless of reference.
    pub magnitude_floor: f32,
    /// Per-reference magnitude threshold is `reference_hz * magnitude_multiplier`.
    pub magnitude_multiplier: f32,
    /// Observed pitch must lie within `[low, high] * reference`.
    pub plausible_ratio: (f32, f32),

    /// Maximum distance between a ratio and a harmonic multiplier.
    pub harmonic_tolerance: f32,
    /// Harmonic multipliers in checking order.
    pub harmonic_multipliers: Vec<f32>,
    pub harmonic_scope: HarmonicScope,

    /// Auto-detection accepts a string only below this cents distance.
    pub auto_match_cents: f32,
    /// Consecutive frames needed to commit an auto-detected string.
    pub auto_commit_frames: u32,

    pub string_order: StringOrder,
    /// Interval between processing cycles in milliseconds.
    pub cycle_interval_ms: u64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            frame_size: 4096,
            lowpass_cutoff_hz: 450.0,
            lowpass_order: 5,
            min_freq: 70.0,
            max_freq: 450.0,
            interpolate_peak: true,
            cents_tolerance: 10.0,
            magnitude_floor: 50.0,
            magnitude_multiplier: 0.8,
            plausible_ratio: (0.5, 1.5),
            harmonic_tolerance: 0.15,
            harmonic_multipliers: DEFAULT_HARMONICS.to_vec(),
            harmonic_scope: HarmonicScope::AllStrings,
            auto_match_cents: 150.0,
            auto_commit_frames: 20,
            string_order: StringOrder::LowToHigh,
            cycle_interval_ms: 100,
        }
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

impl TunerConfig {
    pub fn nyquist_hz(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    /// Wall-clock length of one frame.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_size as f64 / self.sample_rate.max(1) as f64)
    }

    /// Checks every field; the first problem found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.frame_size == 0 {
            return Err(ConfigError::ZeroFrameSize);
        }
        if self.lowpass_order == 0 {
            return Err(ConfigError::ZeroFilterOrder);
        }
        let nyquist_hz = self.nyquist_hz();
        let normalized = self.lowpass_cutoff_hz / nyquist_hz;
        if !(normalized > 0.0 && normalized < 1.0) {
            return Err(ConfigError::CutoffOutOfRange {
                cutoff_hz: self.lowpass_cutoff_hz,
                nyquist_hz,
            });
        }
        if !(self.min_freq >= 0.0 && self.min_freq < self.max_freq && self.max_freq <= nyquist_hz) {
            return Err(ConfigError::InvalidSearchBand {
                min_freq: self.min_freq,
                max_freq: self.max_freq,
                nyquist_hz,
            });
        }

        positive("cents_tolerance", self.cents_tolerance)?;
        positive("magnitude_floor", self.magnitude_floor)?;
        positive("magnitude_multiplier", self.magnitude_multiplier)?;
        positive("harmonic_tolerance", self.harmonic_tolerance)?;
        positive("auto_match_cents", self.auto_match_cents)?;

        if self.harmonic_multipliers.is_empty() {
            return Err(ConfigError::NoHarmonics);
        }
        for &harmonic in &self.harmonic_multipliers {
            positive("harmonic multiplier", harmonic)?;
        }

        let (low, high) = self.plausible_ratio;
        if !(low > 0.0 && low < high && high.is_finite()) {
            return Err(ConfigError::InvalidPlausibleRatio { low, high });
        }
        if self.auto_commit_frames == 0 {
            return Err(ConfigError::ZeroCommitThreshold);
        }
        if self.cycle_interval_ms == 0 {
            return Err(ConfigError::ZeroCycleInterval);
        }
        Ok(())
    }
}
