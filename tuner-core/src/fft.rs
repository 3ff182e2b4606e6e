//! # Fast Fourier Transform (FFT) Module
//!
//! This module turns a filtered time-domain frame into a magnitude spectrum
//! and picks the dominant frequency inside a bounded search band.
//!
//! ## Features
//! - High-performance FFT using RustFFT, planned once per frame size
//! - Hamming windowing for reduced spectral leakage
//! - Real-input spectrum over the non-negative frequency bins
//! - Band-limited, bin-quantized peak picking

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Symmetric Hamming window of length `len`.
///
/// `w[i] = 0.54 - 0.46 * cos(2 * pi * i / (len - 1))`
pub fn hamming_window(len: usize) -> Vec<f32> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let n_minus_1 = (len - 1) as f32;
            (0..len)
                .map(|i| 0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos())
                .collect()
        }
    }
}

/// Multiplies `signal` element-wise by `window`.
pub fn apply_window(signal: &mut [f32], window: &[f32]) {
    for (sample, w) in signal.iter_mut().zip(window) {
        *sample *= w;
    }
}

/// The strongest spectral bin within the search band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Centre frequency of the peak bin in Hz (or the refined frequency).
    pub frequency: f32,
    /// Magnitude of the peak bin.
    pub magnitude: f32,
    /// Index of the peak bin.
    pub bin: usize,
}

/// Magnitude spectrum of one frame over bins `0..=len/2`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub magnitudes: Vec<f32>,
    /// Spacing between bins: `sample_rate / frame_length`.
    pub bin_width: f32,
}

impl Spectrum {
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_width
    }

    /// Picks the largest bin whose frequency lies in `[min_freq, max_freq]`.
    ///
    /// No interpolation is done; the reported frequency is the bin centre.
    /// Ties keep the lowest bin.
    ///
    /// # Returns
    /// * `Some(estimate)` - Peak bin frequency and magnitude
    /// * `None` - No bin in range, or the band holds no energy at all
    pub fn dominant_frequency(&self, min_freq: f32, max_freq: f32) -> Option<PitchEstimate> {
        let mut best: Option<PitchEstimate> = None;
        for (bin, &magnitude) in self.magnitudes.iter().enumerate() {
            let frequency = self.bin_frequency(bin);
            if frequency < min_freq || frequency > max_freq {
                continue;
            }
            if best.is_none_or(|b| magnitude > b.magnitude) {
                best = Some(PitchEstimate {
                    frequency,
                    magnitude,
                    bin,
                });
            }
        }
        best.filter(|b| b.magnitude > 0.0)
    }
}

/// Cached FFT plan and window for one sample rate and frame size.
pub struct SpectralEstimator {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    sample_rate: u32,
    frame_size: usize,
}

impl std::fmt::Debug for SpectralEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralEstimator")
            .field("sample_rate", &self.sample_rate)
            .field("frame_size", &self.frame_size)
            .finish()
    }
}

impl SpectralEstimator {
    pub fn new(sample_rate: u32, frame_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(frame_size),
            window: hamming_window(frame_size),
            sample_rate,
            frame_size,
        }
    }

    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.frame_size as f32
    }

    /// Returns a Hamming-windowed copy of `signal`.
    pub fn windowed(&self, signal: &[f32]) -> Vec<f32> {
        let mut out = signal.to_vec();
        if out.len() == self.window.len() {
            apply_window(&mut out, &self.window);
        } else {
            let window = hamming_window(out.len());
            apply_window(&mut out, &window);
        }
        out
    }

    /// Computes the magnitude spectrum of an already-windowed signal.
    ///
    /// Frames of an unexpected length get a one-off plan of their own.
    pub fn magnitude_spectrum(&self, signal: &[f32]) -> Spectrum {
        let len = signal.len();
        if len == 0 {
            return Spectrum {
                magnitudes: Vec::new(),
                bin_width: self.bin_width(),
            };
        }

        let mut buffer: Vec<Complex<f32>> = signal
            .iter()
            .map(|&sample| Complex { re: sample, im: 0.0 })
            .collect();

        if len == self.frame_size {
            self.fft.process(&mut buffer);
        } else {
            FftPlanner::new().plan_fft_forward(len).process(&mut buffer);
        }

        Spectrum {
            magnitudes: buffer
                .iter()
                .take(len / 2 + 1)
                .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
                .collect(),
            bin_width: self.sample_rate as f32 / len as f32,
        }
    }

    /// Dominant frequency of a filtered frame within `[min_freq, max_freq]`.
    ///
    /// Windows the frame, transforms it, and picks the peak bin. Silence or a
    /// band with no bins gives `None`.
    pub fn dominant_frequency(
        &self,
        frame: &[f32],
        min_freq: f32,
        max_freq: f32,
    ) -> Option<PitchEstimate> {
        self.magnitude_spectrum(&self.windowed(frame))
            .dominant_frequency(min_freq, max_freq)
    }
}
