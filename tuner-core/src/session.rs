//! # Tuning Session
//!
//! [`Tuner`] runs the per-frame pipeline:
//!
//! frame -> low-pass -> Hamming window -> spectrum -> peak (optionally
//! refined) -> harmonic resolution -> string matching -> classification
//!
//! [`run_session`] drives it from a [`FrameSource`] on a fixed-interval tick
//! until the source closes, a cycle limit is reached, or the stop flag is
//! cleared.

use crossbeam_channel::tick;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::FrameSource;
use crate::config::TunerConfig;
use crate::detection::{DetectionMode, DetectionState};
use crate::error::{ConfigError, FrameError};
use crate::fft::{PitchEstimate, SpectralEstimator};
use crate::filter::LowpassFilter;
use crate::harmonics::{self, HarmonicScope};
use crate::pitch;
use crate::tuning::{self, Classification, GuitarString, ReferenceTable};
use crate::TuningReport;

/// The validated, ready-to-run analysis pipeline.
///
/// Holds no per-session state: detection state is owned by the caller and
/// passed to [`Tuner::process_cycle`] each time.
#[derive(Debug)]
pub struct Tuner {
    config: TunerConfig,
    filter: LowpassFilter,
    estimator: SpectralEstimator,
    references: ReferenceTable,
}

impl Tuner {
    /// Validates `config` and builds the filter, FFT plan and the standard
    /// reference table in the configured string order.
    pub fn new(config: TunerConfig) -> Result<Self, ConfigError> {
        let references = ReferenceTable::standard(config.string_order);
        Self::with_references(config, references)
    }

    /// Like [`Tuner::new`], but matches against a caller-supplied table,
    /// e.g. an alternate tuning built with [`ReferenceTable::from_entries`].
    pub fn with_references(
        config: TunerConfig,
        references: ReferenceTable,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let filter =
            LowpassFilter::design(config.lowpass_cutoff_hz, config.lowpass_order, config.sample_rate)?;
        let estimator = SpectralEstimator::new(config.sample_rate, config.frame_size);

        log::debug!(
            "Tuner ready: {} Hz, {} samples/frame, {:.2} Hz/bin, low-pass {} Hz order {}",
            config.sample_rate,
            config.frame_size,
            estimator.bin_width(),
            filter.cutoff_hz(),
            filter.order()
        );

        Ok(Self {
            config,
            filter,
            estimator,
            references,
        })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn references(&self) -> &ReferenceTable {
        &self.references
    }

    /// Fresh detection state using the configured commit threshold.
    pub fn new_detection_state(&self) -> DetectionState {
        DetectionState::new(self.config.auto_commit_frames)
    }

    fn reference_for(&self, string: GuitarString) -> f32 {
        self.references
            .frequency(string)
            .unwrap_or_else(|| string.standard_frequency())
    }

    fn magnitude_threshold(&self, reference: f32) -> f32 {
        tuning::magnitude_threshold(
            reference,
            self.config.magnitude_floor,
            self.config.magnitude_multiplier,
        )
    }

    /// Spectral peak of one raw frame, refined if configured.
    fn estimate(&self, frame: &[i16]) -> (Option<PitchEstimate>, Vec<f32>) {
        let filtered = self.filter.apply(frame);
        let spectrum = self
            .estimator
            .magnitude_spectrum(&self.estimator.windowed(&filtered));
        let estimate = spectrum
            .dominant_frequency(self.config.min_freq, self.config.max_freq)
            .map(|peak| {
                if self.config.interpolate_peak {
                    pitch::refine_peak(&spectrum, peak)
                } else {
                    peak
                }
            });
        (estimate, spectrum.magnitudes)
    }

    /// Divides an overtone down to its fundamental.
    fn resolve_harmonic(&self, raw: f32, mode: DetectionMode) -> f32 {
        let multipliers = &self.config.harmonic_multipliers;
        let tolerance = self.config.harmonic_tolerance;
        match (self.config.harmonic_scope, mode) {
            (HarmonicScope::SelectedString, DetectionMode::Manual(string)) => {
                let pinned = [(string, self.reference_for(string))];
                harmonics::resolve(raw, pinned, multipliers, tolerance).0
            }
            _ => harmonics::resolve_with_table(raw, &self.references, multipliers, tolerance).0,
        }
    }

    /// String the estimate belongs to, for auto-detection.
    ///
    /// Needs a cents match within the acceptance threshold and enough
    /// magnitude for that string.
    fn detect_string(&self, frequency: f32, magnitude: f32) -> Option<GuitarString> {
        let (string, _) = tuning::closest_string_by_cents(
            frequency,
            &self.references,
            self.config.auto_match_cents,
        )?;
        (magnitude > self.magnitude_threshold(self.reference_for(string))).then_some(string)
    }

    /// Runs the full pipeline on one frame.
    ///
    /// Auto-detection advances `state` when it is in `Auto`. Classification
    /// is always against the selected string: the pinned one in `Manual`, the
    /// detected one in `Auto`, or the first table entry when nothing was
    /// detected.
    ///
    /// # Returns
    /// * `Ok(report)` - Result for this cycle (possibly `NoSignal`)
    /// * `Err(FrameError::ShortFrame)` - Frame length mismatch; skip the cycle
    pub fn process_cycle(
        &self,
        frame: &[i16],
        state: &mut DetectionState,
    ) -> Result<TuningReport, FrameError> {
        if frame.len() != self.config.frame_size {
            return Err(FrameError::ShortFrame {
                expected: self.config.frame_size,
                actual: frame.len(),
            });
        }

        let (estimate, spectrum) = self.estimate(frame);
        let raw_frequency = estimate.map(|e| e.frequency);
        let magnitude = estimate.map(|e| e.magnitude);
        let observed = raw_frequency.map(|raw| self.resolve_harmonic(raw, state.mode()));

        let detected_string = match (observed, magnitude) {
            (Some(freq), Some(mag)) if state.is_auto() => self.detect_string(freq, mag),
            _ => None,
        };
        if state.is_auto() {
            state.observe(detected_string);
        }

        let selected_string = match state.mode() {
            DetectionMode::Manual(string) => string,
            DetectionMode::Auto => detected_string.unwrap_or(self.references.first().0),
        };
        let reference_frequency = self.reference_for(selected_string);

        let cents_offset = match (observed, magnitude) {
            (Some(freq), Some(mag))
                if mag > self.magnitude_threshold(reference_frequency)
                    && tuning::is_plausible(freq, reference_frequency, self.config.plausible_ratio) =>
            {
                tuning::cents_offset(freq, reference_frequency)
            }
            _ => None,
        };
        let classification = cents_offset.map_or(Classification::NoSignal, |cents| {
            tuning::classify(cents, self.config.cents_tolerance)
        });

        log::trace!(
            "raw {raw_frequency:?} Hz -> {observed:?} Hz, {selected_string} {cents_offset:?} cents, {classification:?}"
        );

        Ok(TuningReport {
            observed_frequency: observed,
            raw_frequency,
            magnitude,
            selected_string,
            detected_string,
            reference_frequency,
            cents_offset,
            classification,
            detection_mode: state.mode(),
            spectrum,
        })
    }
}

/// Shared run/stop flag, checked at the start of every cycle.
#[derive(Debug, Clone)]
pub struct SessionControl {
    running: Arc<AtomicBool>,
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionControl {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Stopped,
    CycleLimit,
    SourceClosed,
}

/// Counters for a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Cycles started, including skipped ones.
    pub cycles: u64,
    /// Reports delivered to the sink.
    pub reports: u64,
    /// Cycles skipped because of a transient frame error.
    pub skipped: u64,
    pub ended_by: SessionEnd,
}

/// Runs processing cycles on a fixed-interval tick.
///
/// Each cycle reads one frame, runs [`Tuner::process_cycle`] and hands the
/// report to `sink`. Transient frame errors skip the cycle and the next one
/// follows on the regular tick. The loop ends when `control` is stopped,
/// after `max_cycles` cycles, or when the source closes.
pub fn run_session<S, F>(
    tuner: &Tuner,
    source: &mut S,
    state: &mut DetectionState,
    control: &SessionControl,
    max_cycles: Option<u64>,
    mut sink: F,
) -> SessionStats
where
    S: FrameSource + ?Sized,
    F: FnMut(&TuningReport),
{
    let ticker = tick(tuner.config().cycle_interval());
    let mut stats = SessionStats {
        cycles: 0,
        reports: 0,
        skipped: 0,
        ended_by: SessionEnd::Stopped,
    };

    log::info!(
        "Session started, one cycle every {} ms",
        tuner.config().cycle_interval_ms
    );

    loop {
        if !control.is_running() {
            stats.ended_by = SessionEnd::Stopped;
            break;
        }
        if max_cycles.is_some_and(|limit| stats.cycles >= limit) {
            stats.ended_by = SessionEnd::CycleLimit;
            break;
        }
        stats.cycles += 1;

        let outcome = source
            .read()
            .and_then(|frame| tuner.process_cycle(&frame, state));
        match outcome {
            Ok(report) => {
                stats.reports += 1;
                sink(&report);
            }
            Err(err) if err.is_transient() => {
                log::warn!("{err}");
                stats.skipped += 1;
            }
            Err(_) => {
                log::info!("Frame source closed");
                stats.ended_by = SessionEnd::SourceClosed;
                break;
            }
        }

        if ticker.recv().is_err() {
            break;
        }
    }

    log::info!(
        "Session finished after {} cycles ({} skipped): {:?}",
        stats.cycles,
        stats.skipped,
        stats.ended_by
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sine_frame;
    use crate::tuning::StringOrder;

    fn tuner() -> Tuner {
        Tuner::new(TunerConfig::default()).unwrap()
    }

    fn frame(freq: f32) -> Vec<i16> {
        sine_frame(freq, 8000.0, 22050, 4096, 0)
    }

    #[test]
    fn invalid_config_prevents_construction() {
        let config = TunerConfig {
            lowpass_cutoff_hz: 12000.0,
            ..TunerConfig::default()
        };
        assert!(matches!(
            Tuner::new(config),
            Err(ConfigError::CutoffOutOfRange { .. })
        ));
    }

    #[test]
    fn wrong_frame_length_is_skipped() {
        let tuner = tuner();
        let mut state = tuner.new_detection_state();
        let result = tuner.process_cycle(&vec![0; 1000], &mut state);
        assert_eq!(
            result.unwrap_err(),
            FrameError::ShortFrame {
                expected: 4096,
                actual: 1000
            }
        );
        assert_eq!(state.run_length(), 0);
    }

    #[test]
    fn silence_reports_no_signal() {
        let tuner = tuner();
        let mut state = tuner.new_detection_state();
        let report = tuner.process_cycle(&vec![0; 4096], &mut state).unwrap();
        assert_eq!(report.observed_frequency, None);
        assert_eq!(report.magnitude, None);
        assert_eq!(report.cents_offset, None);
        assert_eq!(report.classification, Classification::NoSignal);
        assert_eq!(report.selected_string, GuitarString::E2);
        assert_eq!(report.detection_mode, DetectionMode::Auto);
    }

    #[test]
    fn weak_signal_is_below_threshold() {
        let config = TunerConfig {
            magnitude_floor: 1.0e9,
            ..TunerConfig::default()
        };
        let tuner = Tuner::new(config).unwrap();
        let mut state = tuner.new_detection_state();
        let report = tuner.process_cycle(&frame(110.0), &mut state).unwrap();
        assert!(report.observed_frequency.is_some());
        assert_eq!(report.detected_string, None);
        assert_eq!(report.classification, Classification::NoSignal);
    }

    #[test]
    fn a2_tone_is_detected_and_in_tune() {
        let tuner = tuner();
        let mut state = tuner.new_detection_state();
        let report = tuner.process_cycle(&frame(110.0), &mut state).unwrap();
        assert_eq!(report.selected_string, GuitarString::A2);
        assert_eq!(report.detected_string, Some(GuitarString::A2));
        assert!(report.cents_offset.unwrap().abs() < 5.0);
        assert_eq!(report.classification, Classification::InTune);
        assert_eq!(state.run_length(), 1);
    }

    #[test]
    fn sharp_and_flat_tones_are_classified() {
        let tuner = tuner();

        let mut state = tuner.new_detection_state();
        state.pin(GuitarString::D3);
        let sharp = tuner.process_cycle(&frame(146.83 * 1.02), &mut state).unwrap();
        assert_eq!(sharp.classification, Classification::TooHigh);

        let flat = tuner.process_cycle(&frame(146.83 * 0.98), &mut state).unwrap();
        assert_eq!(flat.classification, Classification::TooLow);
    }

    #[test]
    fn pinned_string_outside_plausible_band_is_no_signal() {
        let tuner = tuner();
        let mut state = tuner.new_detection_state();
        state.pin(GuitarString::E4);
        // 110 Hz is a third of E4: far below 0.5x.
        let report = tuner.process_cycle(&frame(110.0), &mut state).unwrap();
        assert_eq!(report.selected_string, GuitarString::E4);
        assert_eq!(report.classification, Classification::NoSignal);
        assert_eq!(report.cents_offset, None);
        assert_eq!(report.detected_string, None);
    }

    #[test]
    fn selected_scope_resolves_only_against_pinned_string() {
        let config = TunerConfig {
            harmonic_scope: HarmonicScope::SelectedString,
            ..TunerConfig::default()
        };
        let scoped = Tuner::new(config).unwrap();
        let mut state = scoped.new_detection_state();
        state.pin(GuitarString::G3);
        // 196 / 82.41 = 2.38 would collapse onto E2 when checking all strings.
        let report = scoped.process_cycle(&frame(196.0), &mut state).unwrap();
        assert_eq!(report.classification, Classification::InTune);

        let literal = tuner();
        let mut state = literal.new_detection_state();
        state.pin(GuitarString::G3);
        let report = literal.process_cycle(&frame(196.0), &mut state).unwrap();
        assert_eq!(report.classification, Classification::NoSignal);
    }

    #[test]
    fn custom_reference_table_is_used_for_matching() {
        // Drop-D: the low string is tuned down to D2.
        let mut entries: Vec<_> = ReferenceTable::standard(StringOrder::LowToHigh).iter().collect();
        entries[0] = (GuitarString::E2, 73.42);
        let table = ReferenceTable::from_entries(entries).unwrap();
        let drop_d = Tuner::with_references(TunerConfig::default(), table).unwrap();

        let mut state = drop_d.new_detection_state();
        state.pin(GuitarString::E2);
        let report = drop_d.process_cycle(&frame(73.42), &mut state).unwrap();
        assert_eq!(report.reference_frequency, 73.42);
        assert_eq!(report.classification, Classification::InTune);

        let standard = tuner();
        let report = standard.process_cycle(&frame(73.42), &mut state).unwrap();
        assert_eq!(report.reference_frequency, 82.41);
        assert_eq!(report.classification, Classification::TooLow);
    }

    #[test]
    fn invalid_config_is_rejected_with_custom_table() {
        let config = TunerConfig {
            frame_size: 0,
            ..TunerConfig::default()
        };
        let table = ReferenceTable::standard(StringOrder::HighToLow);
        assert_eq!(
            Tuner::with_references(config, table).unwrap_err(),
            ConfigError::ZeroFrameSize
        );
    }

    #[test]
    fn stop_flag_ends_session_before_first_cycle() {
        let tuner = tuner();
        let mut state = tuner.new_detection_state();
        let control = SessionControl::new();
        control.stop();
        let mut source = crate::audio::SineFrameSource::new(110.0, 8000.0, 22050, 4096);
        let stats = run_session(&tuner, &mut source, &mut state, &control, None, |_| {});
        assert_eq!(stats.cycles, 0);
        assert_eq!(stats.ended_by, SessionEnd::Stopped);
    }
}
