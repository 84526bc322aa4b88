//! Channel-combination methods: GREEN, CHROM, GBGR and POS.
//!
//! # References
//! - Verkruysse et al. (2008): "Remote plethysmographic imaging using ambient light"
//! - De Haan & Jeanne (2013): "Robust Pulse Rate from Chrominance-Based rPPG"
//! - Wang et al. (2017): "Algorithmic Principles of Remote PPG"

use ndarray::{Array1, ArrayView2};

use crate::dsp::stats;
use crate::trace::{BLUE, GREEN, RED};

const POS_EPS: f64 = 1e-9;

/// Green channel as the pulse.
pub fn green(channels: ArrayView2<'_, f32>) -> Array1<f32> {
    channels.row(GREEN).to_owned()
}

/// CHROM on raw channel means.
///
/// `X = 3R - 2G`, `Y = 1.5R + G - 1.5B`, `S = X - (std X / std Y) Y`.
/// `None` when `Y` has no variance.
pub fn chrom(channels: ArrayView2<'_, f32>) -> Option<Array1<f32>> {
    let r = channels.row(RED);
    let g = channels.row(GREEN);
    let b = channels.row(BLUE);

    let x = (&r * 3.0) - (&g * 2.0);
    let y = (&r * 1.5) + &g - (&b * 1.5);

    let std_y = stats::std(y.view());
    if std_y == 0.0 {
        return None;
    }
    let alpha = stats::std(x.view()) / std_y;
    Some(x - y * alpha)
}

/// `G/B + G/R` per frame. Zero red or blue samples give non-finite output.
pub fn gbgr(channels: ArrayView2<'_, f32>) -> Array1<f32> {
    let r = channels.row(RED);
    let g = channels.row(GREEN);
    let b = channels.row(BLUE);
    Array1::from_shape_fn(channels.ncols(), |t| g[t] / b[t] + g[t] / r[t])
}

/// Plane-Orthogonal-to-Skin with overlap-add.
///
/// For every window of `floor(window_secs * fs)` frames ending at frame
/// `n >= w`, channels are divided by their window means, projected onto
/// `S1 = G - B` and `S2 = -2R + G + B`, tuned as
/// `h = S1 + (std S1 / std S2) S2`, mean-removed and added into the output.
pub fn pos(channels: ArrayView2<'_, f32>, fs: f32, window_secs: f32) -> Array1<f32> {
    let n = channels.ncols();
    let w = (window_secs * fs).floor() as usize;
    let mut h = vec![0.0f64; n];
    if w == 0 {
        return Array1::zeros(n);
    }

    let mut s1 = vec![0.0f64; w];
    let mut s2 = vec![0.0f64; w];
    for end in w..n {
        let start = end + 1 - w;

        let mut means = [0.0f64; 3];
        for (c, mean) in means.iter_mut().enumerate() {
            *mean = (start..=end).map(|t| channels[[c, t]] as f64).sum::<f64>() / w as f64 + POS_EPS;
        }

        for (i, t) in (start..=end).enumerate() {
            let r = channels[[RED, t]] as f64 / means[RED];
            let g = channels[[GREEN, t]] as f64 / means[GREEN];
            let b = channels[[BLUE, t]] as f64 / means[BLUE];
            s1[i] = g - b;
            s2[i] = -2.0 * r + g + b;
        }

        let alpha = stats::std_f64(&s1) / (POS_EPS + stats::std_f64(&s2));
        let hn: Vec<f64> = s1.iter().zip(&s2).map(|(a, b)| a + alpha * b).collect();
        let mean_hn = hn.iter().sum::<f64>() / w as f64;
        for (i, v) in hn.iter().enumerate() {
            h[start + i] += v - mean_hn;
        }
    }

    h.into_iter().map(|v| v as f32).collect()
}
