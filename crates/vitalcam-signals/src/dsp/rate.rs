//! Dominant-rate estimation from an amplitude spectrum.
//!
//! # Algorithm
//!
//! 1. Restrict the spectrum to bins inside the target band
//! 2. Respiration: take the strongest in-band bin
//! 3. Heart rate: score the `top_peaks` strongest in-band local maxima as
//!    `mag(f) + w * min(mag(2f), mag(f))`, where `mag(2f)` is the strongest
//!    bin within `harmonic_tolerance_bins` of the second harmonic, and keep
//!    the best score
//! 4. Convert the winning bin frequency to cycles per minute
//!
//! A peak backed by its own second harmonic therefore beats a slightly
//! stronger isolated artifact, while the `min` cap stops a strong spurious
//! bin at `2f` from promoting a weak sub-harmonic.

use serde::{Deserialize, Serialize};

use crate::config::{Band, HeartConfig, RespirationConfig};
use crate::dsp::spectrum::Spectrum;

/// Magnitude below which an in-band maximum counts as "no signal".
const MIN_PEAK_MAGNITUDE: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateKind {
    /// Beats per minute
    Heart,
    /// Breaths per minute
    Respiration,
}

/// A rate and the spectrum bin it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateEstimate {
    pub kind: RateKind,
    /// Cycles per minute
    pub per_minute: f32,
    pub frequency_hz: f32,
    pub bin: usize,
}

#[derive(Debug, Clone)]
pub struct RateEstimatorConfig {
    pub kind: RateKind,
    pub band: Band,
    /// Enables the harmonic-consistency refinement
    pub harmonic_aware: bool,
    pub top_peaks: usize,
    pub harmonic_tolerance_bins: usize,
    pub harmonic_weight: f32,
}

impl Default for RateEstimatorConfig {
    fn default() -> Self {
        Self::from(&HeartConfig::default())
    }
}

impl From<&HeartConfig> for RateEstimatorConfig {
    fn from(heart: &HeartConfig) -> Self {
        Self {
            kind: RateKind::Heart,
            band: heart.band,
            harmonic_aware: true,
            top_peaks: heart.top_peaks.max(1),
            harmonic_tolerance_bins: heart.harmonic_tolerance_bins,
            harmonic_weight: heart.harmonic_weight,
        }
    }
}

impl From<&RespirationConfig> for RateEstimatorConfig {
    fn from(resp: &RespirationConfig) -> Self {
        Self {
            kind: RateKind::Respiration,
            band: resp.band,
            harmonic_aware: false,
            top_peaks: 1,
            harmonic_tolerance_bins: 0,
            harmonic_weight: 0.0,
        }
    }
}

/// Band-limited dominant-frequency estimator.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    config: RateEstimatorConfig,
}

impl RateEstimator {
    /// Heart-rate estimator with default band and harmonic check
    pub fn heart() -> Self {
        Self::with_config(RateEstimatorConfig::default())
    }

    /// Respiration estimator (plain dominant bin)
    pub fn respiration() -> Self {
        Self::with_config(RateEstimatorConfig::from(&RespirationConfig::default()))
    }

    pub fn with_config(config: RateEstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RateEstimatorConfig {
        &self.config
    }

    /// Estimate the dominant rate, `None` when the band holds no usable bin.
    pub fn estimate(&self, spectrum: &Spectrum) -> Option<RateEstimate> {
        let bins = spectrum.band_bins(self.config.band);
        if bins.is_empty() {
            return None;
        }
        let mags = spectrum.magnitudes();

        let strongest = bins
            .clone()
            .fold(None, |best: Option<usize>, i| match best {
                Some(b) if mags[b] >= mags[i] => Some(b),
                _ => Some(i),
            })?;
        if !(mags[strongest].is_finite() && mags[strongest] > MIN_PEAK_MAGNITUDE) {
            return None;
        }

        let chosen = if self.config.harmonic_aware {
            self.harmonic_choice(spectrum, bins).unwrap_or(strongest)
        } else {
            strongest
        };

        let frequency_hz = spectrum.freqs()[chosen];
        Some(RateEstimate {
            kind: self.config.kind,
            per_minute: frequency_hz * 60.0,
            frequency_hz,
            bin: chosen,
        })
    }

    fn harmonic_choice(&self, spectrum: &Spectrum, bins: std::ops::Range<usize>) -> Option<usize> {
        let mags = spectrum.magnitudes();
        let n = mags.len();
        let tol = self.config.harmonic_tolerance_bins;

        let mut best: Option<(usize, f32)> = None;
        for peak in spectrum
            .peaks_in(bins)
            .into_iter()
            .take(self.config.top_peaks)
        {
            let mag = mags[peak];
            let harmonic = 2 * peak;
            let lo = harmonic.saturating_sub(tol).max(peak + 1);
            let hi = (harmonic + tol + 1).min(n);
            let support = (lo..hi).map(|i| mags[i]).fold(0.0f32, f32::max).min(mag);
            let score = mag + self.config.harmonic_weight * support;

            log::trace!(
                "rate candidate {:.3} Hz: mag {:.4} harmonic {:.4} score {:.4}",
                spectrum.freqs()[peak],
                mag,
                support,
                score
            );

            match best {
                Some((_, s)) if s >= score => {}
                _ => best = Some((peak, score)),
            }
        }
        best.map(|(peak, _)| peak)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::spectrum::amplitude_spectrum;
    use ndarray::Array1;
    use std::f32::consts::PI;

    fn tones(components: &[(f32, f32)], fs: f32, n: usize) -> Array1<f32> {
        Array1::from_shape_fn(n, |i| {
            let t = i as f32 / fs;
            components
                .iter()
                .map(|&(f, a)| a * (2.0 * PI * f * t).sin())
                .sum()
        })
    }

    #[test]
    fn test_pure_tone_with_harmonic() {
        let signal = tones(&[(1.2, 1.0), (2.4, 0.4)], 30.0, 300);
        let spectrum = amplitude_spectrum(signal.view(), 30.0);
        let est = RateEstimator::heart().estimate(&spectrum).unwrap();
        assert!((est.per_minute - 72.0).abs() <= 6.0 + 1e-3);
        assert_eq!(est.bin, 12);
        assert_eq!(est.kind, RateKind::Heart);
    }

    #[test]
    fn test_harmonic_support_beats_isolated_artifact() {
        // 1.0 Hz pulse with a 2.0 Hz harmonic vs a slightly stronger 2.7 Hz artifact
        let signal = tones(&[(1.0, 1.0), (2.0, 0.6), (2.7, 1.2)], 30.0, 300);
        let spectrum = amplitude_spectrum(signal.view(), 30.0);

        let naive = RateEstimator::with_config(RateEstimatorConfig {
            harmonic_aware: false,
            ..RateEstimatorConfig::default()
        })
        .estimate(&spectrum)
        .unwrap();
        assert_eq!(naive.bin, 27);

        let est = RateEstimator::heart().estimate(&spectrum).unwrap();
        assert_eq!(est.bin, 10);
        assert!((est.per_minute - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_strong_harmonic_cannot_promote_weak_subharmonic() {
        // Weak 1.0 Hz bump under a dominant 2.0 Hz pulse
        let signal = tones(&[(1.0, 0.2), (2.0, 1.0)], 30.0, 300);
        let spectrum = amplitude_spectrum(signal.view(), 30.0);
        let est = RateEstimator::heart().estimate(&spectrum).unwrap();
        assert_eq!(est.bin, 20);
    }

    #[test]
    fn test_respiration_band() {
        let signal = tones(&[(0.25, 1.0), (1.2, 2.0)], 30.0, 600);
        let spectrum = amplitude_spectrum(signal.view(), 30.0);
        let est = RateEstimator::respiration().estimate(&spectrum).unwrap();
        assert!((est.per_minute - 15.0).abs() < 1e-3);
        assert_eq!(est.kind, RateKind::Respiration);
    }

    #[test]
    fn test_no_estimate_cases() {
        let heart = RateEstimator::heart();
        assert!(heart.estimate(&Spectrum::empty()).is_none());

        let zeros = amplitude_spectrum(Array1::<f32>::zeros(300).view(), 30.0);
        assert!(heart.estimate(&zeros).is_none());

        // Two samples give only the DC bin, nothing inside the band
        let short = amplitude_spectrum(Array1::from(vec![1.0f32, -1.0]).view(), 30.0);
        assert!(heart.estimate(&short).is_none());
    }
}
