//! # Error Types
//!
//! Two kinds of failure exist in the tuner. Configuration errors are fatal and
//! stop the pipeline before it starts. Frame errors are transient: the cycle
//! that hit one is skipped and the session carries on.

use thiserror::Error;

/// Invalid tuner configuration, detected once at construction time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("sample rate must be positive")]
    ZeroSampleRate,

    #[error("frame size must be positive")]
    ZeroFrameSize,

    #[error("low-pass cutoff {cutoff_hz} Hz must lie strictly between 0 and the Nyquist frequency {nyquist_hz} Hz")]
    CutoffOutOfRange { cutoff_hz: f32, nyquist_hz: f32 },

    #[error("low-pass order must be at least 1")]
    ZeroFilterOrder,

    #[error("search band [{min_freq}, {max_freq}] Hz is empty or exceeds the Nyquist frequency {nyquist_hz} Hz")]
    InvalidSearchBand {
        min_freq: f32,
        max_freq: f32,
        nyquist_hz: f32,
    },

    #[error("reference pitch table is empty")]
    EmptyReferenceTable,

    #[error("harmonic multiplier list is empty")]
    NoHarmonics,

    #[error("plausibility band [{low}, {high}] is empty")]
    InvalidPlausibleRatio { low: f32, high: f32 },

    #[error("auto-detection commit threshold must be at least one frame")]
    ZeroCommitThreshold,

    #[error("cycle interval must be positive")]
    ZeroCycleInterval,

    #[error("{name} must be a positive, finite number (got {value})")]
    NotPositive { name: &'static str, value: f32 },
}

/// A frame that could not be delivered or used this cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    /// The capture buffer overflowed and samples were dropped.
    #[error("input overflowed, skipping this frame")]
    Overflow,

    /// The frame length did not match the configured frame size.
    #[error("frame has {actual} samples, expected {expected}")]
    ShortFrame { expected: usize, actual: usize },

    /// No frame arrived within the read deadline.
    #[error("timed out waiting for an audio frame")]
    Timeout,

    /// The source is gone and will not produce more frames.
    #[error("frame source closed")]
    Closed,
}

impl FrameError {
    /// Transient errors skip one cycle; anything else ends the session.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FrameError::Closed)
    }
}
