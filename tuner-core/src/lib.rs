// tuner-core/src/lib.rs

//! The core logic for the guitar tuner.
//! This crate is responsible for audio capture, filtering, pitch detection,
//! harmonic resolution and string matching. It is completely headless
//! and contains no presentation code.

pub mod audio;
pub mod config;
pub mod detection;
pub mod error;
pub mod fft;
pub mod filter;
pub mod harmonics;
pub mod pitch;
pub mod session;
pub mod tuning;

pub use config::TunerConfig;
pub use detection::{DetectionMode, DetectionState};
pub use error::{ConfigError, FrameError};
pub use session::{run_session, SessionControl, SessionEnd, SessionStats, Tuner};
pub use tuning::{Classification, GuitarString};

/// Represents the result of a single processing cycle.
///
/// This is everything a presentation layer needs to draw a tuner dial.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningReport {
    /// Fundamental frequency in Hz after harmonic resolution.
    pub observed_frequency: Option<f32>,
    /// Spectral peak frequency in Hz before harmonic resolution.
    pub raw_frequency: Option<f32>,
    /// Magnitude of the spectral peak.
    pub magnitude: Option<f32>,
    /// String the deviation is measured against.
    pub selected_string: GuitarString,
    /// String auto-detection recognised this cycle (always `None` in manual mode).
    pub detected_string: Option<GuitarString>,
    /// Reference frequency of `selected_string` in Hz.
    pub reference_frequency: f32,
    /// Deviation from the reference in cents, when a classification was made.
    pub cents_offset: Option<f32>,
    pub classification: Classification,
    pub detection_mode: DetectionMode,
    /// Magnitude spectrum of the frame, for plotting.
    pub spectrum: Vec<f32>,
}
