//! # Peak Refinement
//!
//! The spectral estimator reports bin centres, which at 22050 Hz / 4096
//! samples are about 5.4 Hz apart: more than 40 cents at the low E string.
//! This module refines a peak to sub-bin accuracy by fitting a parabola
//! through the log magnitudes of the peak bin and its two neighbours.

use crate::fft::{PitchEstimate, Spectrum};

/// Refines the frequency of `estimate` using its neighbouring bins.
///
/// The magnitude is left at the peak bin's value. Falls back to the
/// unrefined estimate at the spectrum edges, when a neighbour is silent, or
/// when the three points do not form a peak.
///
/// # Arguments
/// * `spectrum` - Spectrum the estimate was picked from
/// * `estimate` - Bin-quantized peak
///
/// # Returns
/// * Estimate whose frequency lies within half a bin of the peak bin centre
pub fn refine_peak(spectrum: &Spectrum, estimate: PitchEstimate) -> PitchEstimate {
    let bin = estimate.bin;
    let mags = &spectrum.magnitudes;
    if bin == 0 || bin + 1 >= mags.len() {
        return estimate;
    }

    let y1 = mags[bin - 1].ln();
    let y2 = mags[bin].ln();
    let y3 = mags[bin + 1].ln();
    if !y1.is_finite() || !y2.is_finite() || !y3.is_finite() {
        return estimate;
    }

    let denominator = 2.0 * y2 - y1 - y3;
    if denominator <= 1e-6 {
        return estimate;
    }

    let peak_shift = ((y3 - y1) / (2.0 * denominator)).clamp(-0.5, 0.5);
    let frequency = (bin as f32 + peak_shift) * spectrum.bin_width;

    if frequency.is_finite() && frequency > 0.0 {
        PitchEstimate {
            frequency,
            ..estimate
        }
    } else {
        estimate
    }
}
