//! DSP (Digital Signal Processing) module
//!
//! Conditioning and analysis of extracted pulse waveforms:
//! - `BandPassFilter` - zero-phase Butterworth band-pass
//! - `amplitude_spectrum` / `Spectrum` - non-negative half of the DFT magnitude
//! - `RateEstimator` - band-limited, harmonic-aware dominant rate
//! - `QualityScorer` - spectral, windowed and distribution-shape quality indices

pub mod filters;
pub mod rate;
pub mod signal_quality;
pub mod spectrum;
pub mod stats;

pub use filters::{BandPassFilter, Biquad, MAX_FILTER_ORDER};
pub use rate::{RateEstimate, RateEstimator, RateEstimatorConfig, RateKind};
pub use signal_quality::{
    amplitude_variability_ratio, best_window_ratio, spectral_peak_quality, QualityScorer,
    QualityScorerConfig, QualityScores, SpectralQualityConfig, WindowSearch,
};
pub use spectrum::{amplitude_spectrum, Spectrum};
