//! # Text Display
//!
//! Renders one [`TuningReport`] per line: the selected string, detection
//! mode, measured frequency, a cent meter and the verdict.

use tuner_core::{Classification, DetectionMode, TuningReport};

/// Maximum cent deviation shown by the meter.
/// The meter shows deviations from -50 to +50 cents.
const METER_RANGE: f32 = 50.0;

/// Characters on each side of the centre mark.
const METER_HALF_WIDTH: usize = 20;

/// Draws the cent meter, e.g. `[-------------|---*-----------------]`.
pub fn cent_meter(cents: Option<f32>) -> String {
    let width = METER_HALF_WIDTH * 2 + 1;
    let mut cells = vec!['-'; width];
    cells[METER_HALF_WIDTH] = '|';

    if let Some(c) = cents {
        let clamped = c.clamp(-METER_RANGE, METER_RANGE);
        let position = ((clamped + METER_RANGE) / (2.0 * METER_RANGE) * (width - 1) as f32).round();
        cells[position as usize] = '*';
    }

    let mut meter = String::with_capacity(width + 2);
    meter.push('[');
    meter.extend(cells);
    meter.push(']');
    meter
}

fn verdict(classification: Classification) -> &'static str {
    match classification {
        Classification::NoSignal => "no signal",
        Classification::InTune => "in tune",
        Classification::TooHigh => "too high",
        Classification::TooLow => "too low",
    }
}

/// Formats a report as a single status line.
pub fn render(report: &TuningReport) -> String {
    let mode = match report.detection_mode {
        DetectionMode::Auto => "auto",
        DetectionMode::Manual(_) => "manual",
    };
    let frequency = report
        .observed_frequency
        .map_or_else(|| "   ---   ".to_string(), |f| format!("{f:7.2}Hz"));
    let cents = report
        .cents_offset
        .map_or_else(|| "   ---".to_string(), |c| format!("{c:+6.1}"));

    format!(
        "{:<2} ({:6.2}Hz) {:<6} {} {} cents {} {}",
        report.selected_string.name(),
        report.reference_frequency,
        mode,
        frequency,
        cents,
        cent_meter(report.cents_offset),
        verdict(report.classification)
    )
}
