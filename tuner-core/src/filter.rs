//! # Low-pass Pre-filter
//!
//! Digital Butterworth low-pass applied to each raw frame before spectral
//! analysis. It attenuates string overtones and noise above the band of
//! guitar fundamentals so the peak picker sees less competing energy.
//!
//! The design follows the usual cascade recipe: an order-N Butterworth is
//! split into `N / 2` second-order sections (one per conjugate pole pair)
//! plus a first-order section when N is odd. Each section is discretised
//! with the bilinear transform, pre-warped at the cutoff, and run in
//! Transposed Direct Form II.

use crate::error::ConfigError;
use std::f64::consts::PI;

/// Coefficients of one normalised section (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Section {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Section {
    /// Second-order low-pass with quality factor `q` at normalised angular
    /// frequency `omega`.
    fn lowpass(omega: f64, q: f64) -> Self {
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * q);
        let a0 = 1.0 + alpha;

        Self {
            b0: (1.0 - cos_omega) / 2.0 / a0,
            b1: (1.0 - cos_omega) / a0,
            b2: (1.0 - cos_omega) / 2.0 / a0,
            a1: -2.0 * cos_omega / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// First-order low-pass for the real pole of odd orders.
    fn lowpass_first_order(omega: f64) -> Self {
        let k = (omega / 2.0).tan();
        Self {
            b0: k / (1.0 + k),
            b1: k / (1.0 + k),
            b2: 0.0,
            a1: (k - 1.0) / (k + 1.0),
            a2: 0.0,
        }
    }

    fn process(&self, input: &mut [f64]) {
        let (mut z1, mut z2) = (0.0, 0.0);
        for sample in input.iter_mut() {
            let x = *sample;
            let y = self.b0 * x + z1;
            z1 = self.b1 * x - self.a1 * y + z2;
            z2 = self.b2 * x - self.a2 * y;
            *sample = y;
        }
    }
}

/// A designed Butterworth low-pass filter.
///
/// Filtering is causal and starts from rest for every frame, so the filter
/// holds coefficients only and can be shared freely.
#[derive(Debug, Clone, PartialEq)]
pub struct LowpassFilter {
    sections: Vec<Section>,
    cutoff_hz: f32,
    order: usize,
}

impl LowpassFilter {
    /// Designs a Butterworth low-pass of the given order.
    ///
    /// # Arguments
    /// * `cutoff_hz` - -3 dB frequency in Hz
    /// * `order` - Filter order (number of poles), at least 1
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * `Err(ConfigError)` - If `cutoff_hz / (sample_rate / 2)` is not strictly
    ///   between 0 and 1, or the order is zero
    pub fn design(cutoff_hz: f32, order: usize, sample_rate: u32) -> Result<Self, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if order == 0 {
            return Err(ConfigError::ZeroFilterOrder);
        }
        let nyquist_hz = sample_rate as f32 / 2.0;
        let normalized = cutoff_hz / nyquist_hz;
        if !(normalized > 0.0 && normalized < 1.0) {
            return Err(ConfigError::CutoffOutOfRange {
                cutoff_hz,
                nyquist_hz,
            });
        }

        let omega = PI * normalized as f64;
        let mut sections: Vec<Section> = (1..=order / 2)
            .map(|k| {
                // Pole pair k sits at angle (2k - 1) * pi / 2N from the
                // imaginary axis.
                let angle = PI * (2 * k - 1) as f64 / (2 * order) as f64;
                Section::lowpass(omega, 1.0 / (2.0 * angle.sin()))
            })
            .collect();
        if order % 2 == 1 {
            sections.push(Section::lowpass_first_order(omega));
        }

        Ok(Self {
            sections,
            cutoff_hz,
            order,
        })
    }

    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Filters one frame of 16-bit samples. Output has the same length.
    pub fn apply(&self, frame: &[i16]) -> Vec<f32> {
        let mut buffer: Vec<f64> = frame.iter().map(|&s| s as f64).collect();
        for section in &self.sections {
            section.process(&mut buffer);
        }
        buffer.into_iter().map(|s| s as f32).collect()
    }
}

/// One-shot convenience: design and apply in a single call.
pub fn lowpass(
    frame: &[i16],
    cutoff_hz: f32,
    order: usize,
    sample_rate: u32,
) -> Result<Vec<f32>, ConfigError> {
    Ok(LowpassFilter::design(cutoff_hz, order, sample_rate)?.apply(frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 22050;

    fn sine(freq: f32, amplitude: f32, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                (amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()).round() as i16
            })
            .collect()
    }

    /// Peak amplitude over the second half, after the start-up transient.
    fn settled_peak(signal: &[f32]) -> f32 {
        signal[signal.len() / 2..]
            .iter()
            .fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn rejects_cutoff_outside_nyquist_range() {
        for cutoff in [0.0, -10.0, 11025.0, 20000.0] {
            assert!(matches!(
                LowpassFilter::design(cutoff, 5, SAMPLE_RATE),
                Err(ConfigError::CutoffOutOfRange { .. })
            ));
        }
        assert_eq!(
            LowpassFilter::design(450.0, 0, SAMPLE_RATE),
            Err(ConfigError::ZeroFilterOrder)
        );
    }

    #[test]
    fn section_count_follows_order() {
        assert_eq!(LowpassFilter::design(450.0, 5, SAMPLE_RATE).unwrap().sections.len(), 3);
        assert_eq!(LowpassFilter::design(450.0, 4, SAMPLE_RATE).unwrap().sections.len(), 2);
        assert_eq!(LowpassFilter::design(450.0, 1, SAMPLE_RATE).unwrap().sections.len(), 1);
    }

    #[test]
    fn output_length_matches_input() {
        let frame = sine(110.0, 8000.0, 4096);
        assert_eq!(lowpass(&frame, 450.0, 5, SAMPLE_RATE).unwrap().len(), 4096);
        assert!(lowpass(&[], 450.0, 5, SAMPLE_RATE).unwrap().is_empty());
    }

    #[test]
    fn unity_gain_at_dc() {
        let filter = LowpassFilter::design(450.0, 5, SAMPLE_RATE).unwrap();
        let out = filter.apply(&vec![1000; 4096]);
        assert!((out[4095] - 1000.0).abs() < 1.0);
    }

    #[test]
    fn passes_band_and_attenuates_above_cutoff() {
        let filter = LowpassFilter::design(450.0, 5, SAMPLE_RATE).unwrap();

        let passed = settled_peak(&filter.apply(&sine(110.0, 8000.0, 4096)));
        assert!(passed > 7500.0 && passed < 8500.0, "110 Hz peak {passed}");

        // Near the cutoff a Butterworth is 3 dB down.
        let edge = settled_peak(&filter.apply(&sine(450.0, 8000.0, 4096)));
        assert!((edge / 8000.0 - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.05);

        // Two octaves above: 5th order gives roughly 60 dB of attenuation.
        let stopped = settled_peak(&filter.apply(&sine(1800.0, 8000.0, 4096)));
        assert!(stopped < 80.0, "1800 Hz peak {stopped}");
    }
}
