//! Descriptive statistics over waveforms.
//!
//! All moments are population moments (`ddof = 0`).

use ndarray::{Array1, ArrayView1};

/// Arithmetic mean, 0 for an empty signal.
pub fn mean(signal: ArrayView1<'_, f32>) -> f32 {
    signal.mean().unwrap_or(0.0)
}

/// Population standard deviation, 0 for an empty or constant signal.
pub fn std(signal: ArrayView1<'_, f32>) -> f32 {
    let (m, m2, _) = central_moments(signal);
    if is_residue(m, m2) {
        return 0.0;
    }
    m2.sqrt() as f32
}

/// Population standard deviation of an f64 slice, 0 when empty.
pub fn std_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let m = values.iter().sum::<f64>() / n;
    (values.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / n).sqrt()
}

/// Mean and second/fourth central moments, accumulated in f64.
fn central_moments(signal: ArrayView1<'_, f32>) -> (f64, f64, f64) {
    let n = signal.len();
    if n == 0 {
        return (0.0, 0.0, 0.0);
    }
    let m = signal.iter().map(|&x| x as f64).sum::<f64>() / n as f64;
    let (m2, m4) = signal.iter().fold((0.0f64, 0.0f64), |(m2, m4), &x| {
        let d = x as f64 - m;
        let d2 = d * d;
        (m2 + d2, m4 + d2 * d2)
    });
    (m, m2 / n as f64, m4 / n as f64)
}

/// Rounding residue of a constant signal counts as zero variance.
#[inline]
fn is_residue(mean: f64, m2: f64) -> bool {
    m2 <= 1e-14 * mean * mean + f64::MIN_POSITIVE
}

/// Remove the mean.
pub fn detrend(signal: ArrayView1<'_, f32>) -> Array1<f32> {
    let m = mean(signal);
    signal.mapv(|x| x - m)
}

/// Zero-mean, unit-variance copy; all zeros when the variance vanishes.
pub fn normalize(signal: ArrayView1<'_, f32>) -> Array1<f32> {
    let m = mean(signal);
    let s = std(signal);
    if s == 0.0 || !s.is_finite() {
        return Array1::zeros(signal.len());
    }
    signal.mapv(|x| (x - m) / s)
}

/// Fisher (excess) kurtosis, biased estimator.
///
/// A normal distribution scores 0. Empty or constant signals score 0.
pub fn kurtosis(signal: ArrayView1<'_, f32>) -> f32 {
    let (m, m2, m4) = central_moments(signal);
    if is_residue(m, m2) {
        return 0.0;
    }
    let k = (m4 / (m2 * m2) - 3.0) as f32;
    if k.is_finite() {
        k
    } else {
        0.0
    }
}

/// True when every sample is finite.
pub fn all_finite(signal: ArrayView1<'_, f32>) -> bool {
    signal.iter().all(|x| x.is_finite())
}
