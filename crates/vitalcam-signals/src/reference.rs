//! Reference-instrument rates for accuracy reporting.
//!
//! Contact ECG and a pressure respiration belt recorded alongside the video
//! give ground-truth rates. They only fill the error columns of the output
//! records and never influence candidate selection.
//!
//! - ECG: R-peaks are local maxima above a height threshold with a minimum
//!   spacing; the rate is the mean of the instantaneous `60 / RR` values.
//! - Belt: the dominant in-band bin of the raw pressure spectrum.

use serde::{Deserialize, Serialize};

use crate::config::{Band, ConfigError};
use crate::dsp::rate::{RateEstimator, RateEstimatorConfig, RateKind};
use crate::dsp::spectrum::amplitude_spectrum;
use ndarray::Array1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Reference window from the first timestamp (seconds)
    pub window_secs: f32,
    /// Minimum R-peak amplitude (raw ECG units)
    pub ecg_min_height: f32,
    /// R-peak spacing is at least `fs / ecg_distance_divisor` samples
    pub ecg_distance_divisor: f32,
    pub respiration_band: Band,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            window_secs: 30.0,
            ecg_min_height: 400.0,
            ecg_distance_divisor: 1.5,
            respiration_band: Band::RESPIRATION,
        }
    }
}

impl ReferenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.window_secs > 0.0) {
            return Err(ConfigError::Validation(
                "reference.window_secs must be positive".to_string(),
            ));
        }
        if !(self.ecg_distance_divisor > 0.0) {
            return Err(ConfigError::Validation(
                "reference.ecg_distance_divisor must be positive".to_string(),
            ));
        }
        let band = self.respiration_band;
        if !(band.low > 0.0 && band.low < band.high) {
            return Err(ConfigError::Validation(
                "reference.respiration_band must satisfy 0 < low < high".to_string(),
            ));
        }
        Ok(())
    }
}

/// A timestamped instrument channel.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceSignal<'a> {
    /// Milliseconds, any origin
    pub timestamps_ms: &'a [f64],
    pub values: &'a [f32],
}

impl<'a> ReferenceSignal<'a> {
    pub fn new(timestamps_ms: &'a [f64], values: &'a [f32]) -> Self {
        Self {
            timestamps_ms,
            values,
        }
    }

    /// Relative times (s) and values up to `window_secs` after the first sample.
    fn window(&self, window_secs: f32) -> (Vec<f64>, Vec<f32>) {
        let Some(&t0) = self.timestamps_ms.first() else {
            return (Vec::new(), Vec::new());
        };
        self.timestamps_ms
            .iter()
            .zip(self.values)
            .map(|(&t, &v)| ((t - t0) / 1000.0, v))
            .filter(|&(t, _)| t <= window_secs as f64)
            .unzip()
    }
}

/// Ground-truth rates of one recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRates {
    pub heart_bpm: Option<f32>,
    pub respiration_rpm: Option<f32>,
}

impl ReferenceRates {
    pub fn measure(
        ecg: Option<ReferenceSignal<'_>>,
        belt: Option<ReferenceSignal<'_>>,
        config: &ReferenceConfig,
    ) -> Self {
        Self {
            heart_bpm: ecg.and_then(|s| ecg_heart_rate(s, config)),
            respiration_rpm: belt.and_then(|s| belt_respiration_rate(s, config)),
        }
    }
}

/// Mean instantaneous heart rate from ECG R-peaks.
///
/// The sample rate is `samples / last relative timestamp`. Fewer than two
/// R-peaks give `None`.
pub fn ecg_heart_rate(signal: ReferenceSignal<'_>, config: &ReferenceConfig) -> Option<f32> {
    let (times, values) = signal.window(config.window_secs);
    let span = *times.last()?;
    if !(span > 0.0) {
        return None;
    }
    let fs = values.len() as f64 / span;
    let peaks = find_peaks(&values, config.ecg_min_height, (fs / config.ecg_distance_divisor as f64) as f32);
    if peaks.len() < 2 {
        log::debug!("ECG reference has {} R-peaks, no rate", peaks.len());
        return None;
    }

    let rates: Vec<f64> = peaks
        .windows(2)
        .map(|w| 60.0 * fs / (w[1] - w[0]) as f64)
        .collect();
    Some((rates.iter().sum::<f64>() / rates.len() as f64) as f32)
}

/// Respiration rate from the raw belt signal.
///
/// The sample rate is `samples / window_secs`. No in-band bin gives `None`.
pub fn belt_respiration_rate(signal: ReferenceSignal<'_>, config: &ReferenceConfig) -> Option<f32> {
    let (_, values) = signal.window(config.window_secs);
    if values.is_empty() {
        return None;
    }
    let fs = values.len() as f32 / config.window_secs;
    let spectrum = amplitude_spectrum(Array1::from(values).view(), fs);
    let estimator = RateEstimator::with_config(RateEstimatorConfig {
        kind: RateKind::Respiration,
        band: config.respiration_band,
        harmonic_aware: false,
        top_peaks: 1,
        harmonic_tolerance_bins: 0,
        harmonic_weight: 0.0,
    });
    estimator.estimate(&spectrum).map(|e| e.per_minute)
}

/// Indices of local maxima at least `min_height` high and at least
/// `min_distance` samples apart.
///
/// Flat peaks resolve to their middle sample (rounded down); the end points
/// never qualify. When two peaks are closer than `min_distance` the higher
/// one is kept. Among equal heights the later index is kept, the same order
/// `scipy.signal.find_peaks` settles them in.
pub fn find_peaks(signal: &[f32], min_height: f32, min_distance: f32) -> Vec<usize> {
    let n = signal.len();
    let mut peaks = Vec::new();
    let mut i = 1;
    while i + 1 < n {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead + 1 < n && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks.retain(|&p| signal[p] >= min_height);

    let distance = min_distance.ceil().max(1.0) as usize;
    if distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    let mut by_height: Vec<usize> = (0..peaks.len()).collect();
    by_height.sort_by(|&a, &b| {
        signal[peaks[b]]
            .total_cmp(&signal[peaks[a]])
            .then(b.cmp(&a))
    });
    let mut keep = vec![true; peaks.len()];
    for &idx in &by_height {
        if !keep[idx] {
            continue;
        }
        let centre = peaks[idx];
        for (j, &p) in peaks.iter().enumerate() {
            if j != idx && keep[j] && p.abs_diff(centre) < distance {
                keep[j] = false;
            }
        }
    }
    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}
