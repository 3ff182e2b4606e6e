//! # Guitar Tuning Module
//!
//! This module holds the musical side of the tuner: the six standard guitar
//! strings, their reference pitches, and the logic that matches a detected
//! frequency to a string and measures how far off it is in cents.
//!
//! ## Features
//! - Closed enumeration of the six standard-tuning strings (E2 to E4)
//! - Ordered reference pitch table (low-to-high or high-to-low)
//! - Nearest-string matching by Hz distance or by cents distance
//! - Cent deviation and in-tune / sharp / flat classification
//! - Magnitude and plausibility gates for rejecting weak or misleading input

use crate::error::ConfigError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the six strings of a guitar in standard tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuitarString {
    E2,
    A2,
    D3,
    G3,
    B3,
    E4,
}

impl GuitarString {
    /// All strings, lowest pitch first.
    pub const ALL: [GuitarString; 6] = [
        GuitarString::E2,
        GuitarString::A2,
        GuitarString::D3,
        GuitarString::G3,
        GuitarString::B3,
        GuitarString::E4,
    ];

    /// Label of the string, e.g. "A2".
    pub fn name(self) -> &'static str {
        match self {
            GuitarString::E2 => "E2",
            GuitarString::A2 => "A2",
            GuitarString::D3 => "D3",
            GuitarString::G3 => "G3",
            GuitarString::B3 => "B3",
            GuitarString::E4 => "E4",
        }
    }

    /// Standard-tuning reference frequency in Hz.
    pub fn standard_frequency(self) -> f32 {
        match self {
            GuitarString::E2 => 82.41,
            GuitarString::A2 => 110.00,
            GuitarString::D3 => 146.83,
            GuitarString::G3 => 196.00,
            GuitarString::B3 => 246.94,
            GuitarString::E4 => 329.63,
        }
    }
}

impl fmt::Display for GuitarString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a label does not name one of the six strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown guitar string '{0}' (expected one of E2, A2, D3, G3, B3, E4)")]
pub struct UnknownString(pub String);

impl FromStr for GuitarString {
    type Err = UnknownString;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GuitarString::ALL
            .into_iter()
            .find(|string| string.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownString(s.to_string()))
    }
}

/// Physical ordering of the reference table. Matching ties and the harmonic
/// resolver both follow this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringOrder {
    #[default]
    LowToHigh,
    HighToLow,
}

/// Outcome of comparing an observed pitch with its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// No usable estimate: silence, weak signal, or implausible frequency.
    NoSignal,
    InTune,
    TooHigh,
    TooLow,
}

/// Standard tuning, lowest string first. Computed once at startup.
static STANDARD_TUNING: Lazy<Vec<(GuitarString, f32)>> = Lazy::new(|| {
    GuitarString::ALL
        .iter()
        .map(|&string| (string, string.standard_frequency()))
        .collect()
});

/// Ordered mapping from string to reference frequency.
///
/// The table is never empty and every frequency is positive; both are
/// checked when it is built. Iteration order is the insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTable {
    entries: Vec<(GuitarString, f32)>,
}

impl ReferenceTable {
    /// Standard tuning in the requested order.
    pub fn standard(order: StringOrder) -> Self {
        let mut entries = STANDARD_TUNING.clone();
        if order == StringOrder::HighToLow {
            entries.reverse();
        }
        Self { entries }
    }

    /// Builds a table from explicit entries, rejecting an empty list or
    /// non-positive frequencies.
    pub fn from_entries(entries: Vec<(GuitarString, f32)>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyReferenceTable);
        }
        if let Some(&(_, value)) = entries
            .iter()
            .find(|(_, freq)| !(freq.is_finite() && *freq > 0.0))
        {
            return Err(ConfigError::NotPositive {
                name: "reference frequency",
                value,
            });
        }
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = (GuitarString, f32)> + '_ {
        self.entries.iter().copied()
    }

    /// Reference frequency of `string`, if the table contains it.
    pub fn frequency(&self, string: GuitarString) -> Option<f32> {
        self.iter()
            .find(|(candidate, _)| *candidate == string)
            .map(|(_, freq)| freq)
    }

    /// First entry in table order; shown while nothing has been detected.
    pub fn first(&self) -> (GuitarString, f32) {
        self.entries[0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Calculates the deviation of `observed` from `reference` in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
///
/// # Returns
/// * `Some(cents)` - For positive, finite frequencies
/// * `None` - When the logarithm would be undefined
pub fn cents_offset(observed: f32, reference: f32) -> Option<f32> {
    let valid = |f: f32| f.is_finite() && f > 0.0;
    if !valid(observed) || !valid(reference) {
        return None;
    }
    Some(1200.0 * (observed / reference).log2())
}

/// Finds the string whose reference is closest to `frequency` in Hz.
///
/// Ties go to the entry that appears first in the table.
///
/// # Returns
/// * `(string, distance_hz)` - Closest string and its absolute distance
pub fn closest_string(frequency: f32, table: &ReferenceTable) -> (GuitarString, f32) {
    let mut best = (table.first().0, f32::INFINITY);
    for (string, reference) in table.iter() {
        let distance = (frequency - reference).abs();
        if distance < best.1 {
            best = (string, distance);
        }
    }
    best
}

/// Like [`closest_string`], but only accepts a match within `max_distance_hz`.
pub fn closest_string_within(
    frequency: f32,
    table: &ReferenceTable,
    max_distance_hz: f32,
) -> Option<(GuitarString, f32)> {
    let (string, distance) = closest_string(frequency, table);
    (distance <= max_distance_hz).then_some((string, distance))
}

/// Finds the string closest to `frequency` in musical distance.
///
/// Used for auto-detection. A match is only returned when the smallest
/// cents distance is strictly below `max_cents`; otherwise the input is
/// treated as not belonging to any string.
///
/// # Returns
/// * `Some((string, cents_distance))` - Closest plausible string
/// * `None` - No reference within `max_cents`, or an invalid frequency
pub fn closest_string_by_cents(
    frequency: f32,
    table: &ReferenceTable,
    max_cents: f32,
) -> Option<(GuitarString, f32)> {
    let mut best: Option<(GuitarString, f32)> = None;
    for (string, reference) in table.iter() {
        let Some(distance) = cents_offset(frequency, reference).map(f32::abs) else {
            continue;
        };
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            best = Some((string, distance));
        }
    }
    best.filter(|&(_, distance)| distance < max_cents)
}

/// Classifies a cent deviation against a symmetric tolerance.
pub fn classify(cents: f32, tolerance_cents: f32) -> Classification {
    if cents > tolerance_cents {
        Classification::TooHigh
    } else if cents < -tolerance_cents {
        Classification::TooLow
    } else {
        Classification::InTune
    }
}

/// Minimum spectral magnitude for an estimate to count as signal when
/// measured against `reference`.
pub fn magnitude_threshold(reference: f32, floor: f32, multiplier: f32) -> f32 {
    floor.max(reference * multiplier)
}

/// Whether `observed` lies within `[low, high] * reference`.
pub fn is_plausible(observed: f32, reference: f32, (low, high): (f32, f32)) -> bool {
    observed >= reference * low && observed <= reference * high
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> ReferenceTable {
        ReferenceTable::standard(StringOrder::LowToHigh)
    }

    #[test]
    fn standard_table_follows_requested_order() {
        let low: Vec<_> = standard().iter().map(|(s, _)| s).collect();
        assert_eq!(low, GuitarString::ALL.to_vec());

        let high: Vec<_> = ReferenceTable::standard(StringOrder::HighToLow)
            .iter()
            .map(|(s, _)| s)
            .collect();
        assert_eq!(high.first(), Some(&GuitarString::E4));
        assert_eq!(high.last(), Some(&GuitarString::E2));
    }

    #[test]
    fn parses_string_labels() {
        assert_eq!("a2".parse::<GuitarString>(), Ok(GuitarString::A2));
        assert_eq!(" E4 ".parse::<GuitarString>(), Ok(GuitarString::E4));
        assert!("C4".parse::<GuitarString>().is_err());
    }

    #[test]
    fn rejects_empty_or_invalid_tables() {
        assert_eq!(
            ReferenceTable::from_entries(vec![]),
            Err(ConfigError::EmptyReferenceTable)
        );
        assert!(ReferenceTable::from_entries(vec![(GuitarString::A2, 0.0)]).is_err());
    }

    #[test]
    fn cents_is_zero_at_reference_and_increasing() {
        assert_eq!(cents_offset(110.0, 110.0), Some(0.0));

        let mut previous = f32::NEG_INFINITY;
        for step in 0..200 {
            let freq = 80.0 + step as f32 * 0.5;
            let cents = cents_offset(freq, 110.0).unwrap();
            assert!(cents > previous, "not increasing at {freq} Hz");
            previous = cents;
        }

        let octave = cents_offset(220.0, 110.0).unwrap();
        assert!((octave - 1200.0).abs() < 1e-3);
    }

    #[test]
    fn cents_guards_undefined_logarithm() {
        assert_eq!(cents_offset(0.0, 110.0), None);
        assert_eq!(cents_offset(-5.0, 110.0), None);
        assert_eq!(cents_offset(110.0, 0.0), None);
        assert_eq!(cents_offset(f32::NAN, 110.0), None);
    }

    #[test]
    fn closest_string_by_hz() {
        let (string, distance) = closest_string(112.0, &standard());
        assert_eq!(string, GuitarString::A2);
        assert!((distance - 2.0).abs() < 1e-4);

        assert_eq!(closest_string(1000.0, &standard()).0, GuitarString::E4);
    }

    #[test]
    fn halfway_frequency_goes_to_first_in_table_order() {
        // Midpoints chosen so both distances are bit-identical in f32.
        let e2_a2 = (82.41_f32 + 110.0) / 2.0;
        assert_eq!(closest_string(e2_a2, &standard()).0, GuitarString::E2);
        let reversed = ReferenceTable::standard(StringOrder::HighToLow);
        assert_eq!(closest_string(e2_a2, &reversed).0, GuitarString::A2);

        let g3_b3 = (196.0_f32 + 246.94) / 2.0;
        assert_eq!(closest_string(g3_b3, &standard()).0, GuitarString::G3);
        assert_eq!(closest_string(g3_b3, &reversed).0, GuitarString::B3);
    }

    #[test]
    fn hz_match_respects_tolerance() {
        assert!(closest_string_within(110.5, &standard(), 1.0).is_some());
        assert!(closest_string_within(113.0, &standard(), 1.0).is_none());
    }

    #[test]
    fn cents_match_rejects_implausible_frequencies() {
        let (string, distance) = closest_string_by_cents(147.5, &standard(), 150.0).unwrap();
        assert_eq!(string, GuitarString::D3);
        assert!(distance < 10.0);

        // Half-way between A2 and D3 is about 250 cents from each.
        assert_eq!(closest_string_by_cents(127.0, &standard(), 150.0), None);
        assert_eq!(closest_string_by_cents(30.0, &standard(), 150.0), None);
        assert_eq!(closest_string_by_cents(0.0, &standard(), 150.0), None);
    }

    #[test]
    fn classification_uses_symmetric_tolerance() {
        assert_eq!(classify(0.0, 10.0), Classification::InTune);
        assert_eq!(classify(10.0, 10.0), Classification::InTune);
        assert_eq!(classify(-10.0, 10.0), Classification::InTune);
        assert_eq!(classify(10.5, 10.0), Classification::TooHigh);
        assert_eq!(classify(-10.5, 10.0), Classification::TooLow);
    }

    #[test]
    fn magnitude_threshold_has_a_floor() {
        assert_eq!(magnitude_threshold(40.0, 50.0, 0.8), 50.0);
        assert!((magnitude_threshold(329.63, 50.0, 0.8) - 263.704).abs() < 1e-3);
    }

    #[test]
    fn plausibility_band_is_inclusive() {
        assert!(is_plausible(55.0, 110.0, (0.5, 1.5)));
        assert!(is_plausible(165.0, 110.0, (0.5, 1.5)));
        assert!(!is_plausible(176.0, 110.0, (0.5, 1.5)));
        assert!(!is_plausible(54.0, 110.0, (0.5, 1.5)));
    }
}
