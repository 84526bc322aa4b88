//! Signal quality indices used to rank candidate waveforms.
//!
//! - **Spectral peak quality**: energy in and around the strongest in-band
//!   peaks (plus the second harmonic) over total band energy, in `[0, 1]`
//! - **Amplitude-to-variability ratio**: `mean / std` of a window, 0 when the
//!   window has no variance
//! - **Best window**: the ratio maximised (or, in the lowest-magnitude
//!   variant, minimised in absolute value) over all windows of a fixed
//!   duration, step one sample
//! - **Kurtosis**: Fisher excess kurtosis of the whole waveform

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::config::{Band, QualityConfig, QualityIndex};
use crate::dsp::spectrum::Spectrum;
use crate::dsp::stats;

/// Which extreme the best-window search reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSearch {
    /// Largest signed ratio
    Highest,
    /// Ratio closest to zero
    LowestMagnitude,
}

/// `mean / std` of a window, 0 for zero variance or an empty window.
pub fn amplitude_variability_ratio(window: ArrayView1<'_, f32>) -> f32 {
    let s = stats::std(window);
    if s == 0.0 || !s.is_finite() {
        return 0.0;
    }
    let ratio = stats::mean(window) / s;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Slide a `floor(window_secs * fs)`-sample window over `signal` and report
/// the extreme amplitude-to-variability ratio.
///
/// `None` when the window is empty or longer than the signal.
pub fn best_window_ratio(
    signal: ArrayView1<'_, f32>,
    fs: f32,
    window_secs: f32,
    search: WindowSearch,
) -> Option<f32> {
    let len = (window_secs * fs).floor();
    if !(len >= 1.0) || len as usize > signal.len() {
        return None;
    }
    let ratios = signal
        .windows(len as usize)
        .into_iter()
        .map(amplitude_variability_ratio);

    match search {
        WindowSearch::Highest => ratios.fold(None, |best: Option<f32>, r| match best {
            Some(b) if b >= r => Some(b),
            _ => Some(r),
        }),
        WindowSearch::LowestMagnitude => ratios.fold(None, |best: Option<f32>, r| match best {
            Some(b) if b.abs() <= r.abs() => Some(b),
            _ => Some(r),
        }),
    }
}

#[derive(Debug, Clone)]
pub struct SpectralQualityConfig {
    pub band: Band,
    /// Number of strongest in-band peaks counted as signal
    pub num_peaks: usize,
    /// Bins on each side of a peak counted with it
    pub peak_halfwidth_bins: usize,
    /// Also count the region around the strongest peak's second harmonic
    pub check_harmonic: bool,
}

impl Default for SpectralQualityConfig {
    fn default() -> Self {
        Self {
            band: Band::HEART,
            num_peaks: 1,
            peak_halfwidth_bins: 1,
            check_harmonic: true,
        }
    }
}

/// Fraction of band energy concentrated around the dominant peaks.
///
/// Energy is `|X|^2`. With `check_harmonic`, the neighbourhood of the
/// strongest peak's second harmonic counts as signal; harmonic bins outside
/// the band are added to the denominator as well, so the score stays within
/// `[0, 1]`. No band energy scores 0.
pub fn spectral_peak_quality(spectrum: &Spectrum, config: &SpectralQualityConfig) -> f32 {
    let bins = spectrum.band_bins(config.band);
    if bins.is_empty() {
        return 0.0;
    }
    let mags = spectrum.magnitudes();
    let n = mags.len();
    let energy = |i: usize| (mags[i] as f64) * (mags[i] as f64);

    let band_energy: f64 = bins.clone().map(energy).sum();
    if !(band_energy.is_finite() && band_energy > 0.0) {
        return 0.0;
    }

    let mut peaks = spectrum.peaks_in(bins.clone());
    if peaks.is_empty() {
        // Monotone band: fall back to its strongest bin
        let strongest = bins
            .clone()
            .fold(bins.start, |b, i| if mags[i] > mags[b] { i } else { b });
        peaks.push(strongest);
    }
    peaks.truncate(config.num_peaks.max(1));

    let hw = config.peak_halfwidth_bins;
    let mut signal_mask = vec![false; n];
    for &p in &peaks {
        for i in p.saturating_sub(hw).max(bins.start)..(p + hw + 1).min(bins.end) {
            signal_mask[i] = true;
        }
    }

    let mut total = band_energy;
    if config.check_harmonic {
        let h = 2 * peaks[0];
        for i in h.saturating_sub(hw)..(h + hw + 1).min(n) {
            if !bins.contains(&i) {
                total += energy(i);
            }
            signal_mask[i] = true;
        }
    }

    let peak_energy: f64 = (0..n).filter(|&i| signal_mask[i]).map(energy).sum();
    ((peak_energy / total) as f32).clamp(0.0, 1.0)
}

/// Quality indices of one candidate waveform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub spectral_peak: f32,
    /// Highest windowed amplitude-to-variability ratio, `None` for a too-short waveform
    pub best_window: Option<f32>,
    /// Lowest-magnitude windowed ratio, `None` for a too-short waveform
    pub lowest_window: Option<f32>,
    pub kurtosis: f32,
    /// The scored waveform had no variance
    pub degenerate: bool,
}

impl QualityScores {
    /// Value the selector ranks by; `None` ranks last.
    ///
    /// Degenerate waveforms have no rank under the lower-is-better indices,
    /// where their zero scores would otherwise look ideal.
    pub fn rank_value(&self, index: QualityIndex) -> Option<f32> {
        let value = match index {
            QualityIndex::SpectralPeak => Some(self.spectral_peak),
            QualityIndex::BestWindow => self.best_window,
            QualityIndex::LowestWindow if self.degenerate => None,
            QualityIndex::LowestWindow => self.lowest_window.map(f32::abs),
            QualityIndex::Kurtosis if self.degenerate => None,
            QualityIndex::Kurtosis => Some(self.kurtosis),
        };
        value.filter(|v| v.is_finite())
    }
}

impl QualityIndex {
    pub fn higher_is_better(&self) -> bool {
        matches!(self, QualityIndex::SpectralPeak | QualityIndex::BestWindow)
    }
}

#[derive(Debug, Clone)]
pub struct QualityScorerConfig {
    pub spectral: SpectralQualityConfig,
    pub window_secs: f32,
}

impl Default for QualityScorerConfig {
    fn default() -> Self {
        Self::new(&QualityConfig::default(), Band::HEART)
    }
}

impl QualityScorerConfig {
    pub fn new(quality: &QualityConfig, band: Band) -> Self {
        Self {
            spectral: SpectralQualityConfig {
                band,
                num_peaks: quality.num_peaks,
                peak_halfwidth_bins: quality.peak_halfwidth_bins,
                check_harmonic: quality.check_harmonic,
            },
            window_secs: quality.window_secs,
        }
    }
}

/// Computes every quality index for a filtered waveform.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    config: QualityScorerConfig,
}

impl QualityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: QualityScorerConfig) -> Self {
        Self { config }
    }

    /// Score a filtered waveform and its amplitude spectrum.
    pub fn score(&self, waveform: ArrayView1<'_, f32>, spectrum: &Spectrum, fs: f32) -> QualityScores {
        let degenerate = stats::std(waveform) == 0.0;
        QualityScores {
            spectral_peak: spectral_peak_quality(spectrum, &self.config.spectral),
            best_window: best_window_ratio(waveform, fs, self.config.window_secs, WindowSearch::Highest),
            lowest_window: best_window_ratio(
                waveform,
                fs,
                self.config.window_secs,
                WindowSearch::LowestMagnitude,
            ),
            kurtosis: stats::kurtosis(waveform),
            degenerate,
        }
    }
}
