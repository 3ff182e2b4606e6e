//! # Harmonic Resolver
//!
//! A plucked string often puts more energy into an overtone than into its
//! fundamental, so the strongest spectral peak can sit at 2x, 3x, ... the
//! pitch actually being played. This module recognises such peaks relative to
//! the reference pitches and divides them back down to the fundamental.

use crate::tuning::{GuitarString, ReferenceTable};
use serde::{Deserialize, Serialize};

/// Harmonic multipliers checked by default, in checking order.
pub const DEFAULT_HARMONICS: [f32; 5] = [2.0, 2.5, 3.0, 3.5, 4.0];

/// Which references the resolver compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmonicScope {
    /// Every reference in table order, whatever the detection mode.
    #[default]
    AllStrings,
    /// Only the pinned string while in manual mode; all strings otherwise.
    SelectedString,
}

/// A frequency that was recognised as an overtone and divided down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicMatch {
    pub string: GuitarString,
    pub harmonic: f32,
}

/// Divides `raw_frequency` down to its fundamental when it sits on a
/// harmonic of one of `references`.
///
/// For every reference, in iteration order, the ratio `raw / reference` is
/// compared with each multiplier in `harmonics`, in list order. The first
/// multiplier within `tolerance` of the ratio wins and no further candidates
/// are examined. This is a first-match rule, not a best-match rule.
///
/// # Returns
/// * `(frequency, Some(match))` - Frequency divided by the matched harmonic
/// * `(raw_frequency, None)` - Nothing matched; frequency is unchanged
pub fn resolve<I>(
    raw_frequency: f32,
    references: I,
    harmonics: &[f32],
    tolerance: f32,
) -> (f32, Option<HarmonicMatch>)
where
    I: IntoIterator<Item = (GuitarString, f32)>,
{
    for (string, reference) in references {
        let ratio = raw_frequency / reference;
        if let Some(&harmonic) = harmonics.iter().find(|&&h| (ratio - h).abs() <= tolerance) {
            log::trace!(
                "{raw_frequency:.2} Hz is harmonic {harmonic} of {string}, using {:.2} Hz",
                raw_frequency / harmonic
            );
            return (
                raw_frequency / harmonic,
                Some(HarmonicMatch { string, harmonic }),
            );
        }
    }
    (raw_frequency, None)
}

/// [`resolve`] against every entry of a reference table.
pub fn resolve_with_table(
    raw_frequency: f32,
    table: &ReferenceTable,
    harmonics: &[f32],
    tolerance: f32,
) -> (f32, Option<HarmonicMatch>) {
    resolve(raw_frequency, table.iter(), harmonics, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::StringOrder;

    fn table() -> ReferenceTable {
        ReferenceTable::standard(StringOrder::LowToHigh)
    }

    #[test]
    fn octave_of_a_string_collapses_to_its_fundamental() {
        let (freq, found) = resolve_with_table(220.0, &table(), &DEFAULT_HARMONICS, 0.15);
        assert!((freq - 110.0).abs() < 1e-3);
        assert_eq!(
            found,
            Some(HarmonicMatch {
                string: GuitarString::A2,
                harmonic: 2.0
            })
        );
    }

    #[test]
    fn fundamentals_pass_through_unchanged() {
        for raw in [82.41, 110.0, 146.83] {
            let (freq, found) = resolve_with_table(raw, &table(), &DEFAULT_HARMONICS, 0.15);
            assert_eq!(freq, raw);
            assert_eq!(found, None);
        }
    }

    #[test]
    fn first_reference_then_first_harmonic_wins() {
        // 329.63 / 82.41 is 4.0; with a wide tolerance both 3.5 and 4 match
        // and list order picks 3.5.
        let (freq, found) = resolve_with_table(329.63, &table(), &DEFAULT_HARMONICS, 0.6);
        let found = found.unwrap();
        assert_eq!(found.string, GuitarString::E2);
        assert_eq!(found.harmonic, 3.5);
        assert!((freq - 329.63 / 3.5).abs() < 1e-3);

        // Reversed, E4 (ratio 1.0) and B3 (1.33) miss, so G3 (1.68) is the
        // first reference to match.
        let reversed = ReferenceTable::standard(StringOrder::HighToLow);
        let (_, found) = resolve_with_table(329.63, &reversed, &DEFAULT_HARMONICS, 0.6);
        let found = found.unwrap();
        assert_eq!(found.string, GuitarString::G3);
        assert_eq!(found.harmonic, 2.0);
    }

    #[test]
    fn tolerance_bounds_the_ratio_band() {
        // 110 * 2.2 = 242: ratio 2.2 to A2 is outside +-0.15 of 2.
        let single = [(GuitarString::A2, 110.0)];
        let (freq, found) = resolve(242.0, single, &DEFAULT_HARMONICS, 0.15);
        assert_eq!(freq, 242.0);
        assert!(found.is_none());

        let (freq, found) = resolve(231.0, single, &DEFAULT_HARMONICS, 0.15);
        assert!((freq - 115.5).abs() < 1e-3);
        assert!(found.is_some());
    }
}
