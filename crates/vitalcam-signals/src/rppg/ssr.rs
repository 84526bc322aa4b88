//! Spatial Subspace Rotation (SSR).
//!
//! Works on per-frame skin patches rather than channel means. For every frame
//! the 3×3 correlation matrix of the skin pixels is eigen-decomposed; the
//! pulse shows up as the rotation of the dominant eigenvector against the
//! plane spanned by the other two eigenvectors of a reference frame `l`
//! frames earlier.
//!
//! # Algorithm
//!
//! For each `k >= l`, with `τ = k - l` and `t` in `τ..k`:
//!
//! ```text
//! SR(t) = sqrt(λ0(t)/λ1(τ)) (u0(t)·u1(τ)) u1(τ) + sqrt(λ0(t)/λ2(τ)) (u0(t)·u2(τ)) u2(τ)
//! p     = SR_0 - (std SR_0 / std SR_1) SR_1
//! P[τ..k] += p - mean(p)
//! ```
//!
//! Windows whose reference frame has a vanishing second or third eigenvalue,
//! or that contain a frame without skin pixels, are skipped.
//!
//! # Reference
//! Wang, Stuijk & de Haan (2015): "A Novel Algorithm for Remote Photoplethysmography: Spatial Subspace Rotation"

use nalgebra::Matrix3;
use ndarray::{Array1, ArrayView3};

use super::linalg::Eigen3;
use crate::dsp::stats;
use crate::trace::PatchStack;

/// Relative eigenvalue floor for a usable reference subspace.
const DEGENERATE_RATIO: f64 = 1e-12;

/// SSR pulse over a patch stack; `window_secs * fs` sets the stride `l`.
pub fn ssr(patches: &PatchStack, fs: f32, window_secs: f32) -> Array1<f32> {
    let k_frames = patches.len();
    let l = (window_secs * fs).floor() as usize;
    let mut p_total = vec![0.0f64; k_frames];
    if l == 0 || l >= k_frames {
        return Array1::zeros(k_frames);
    }

    let eigs: Vec<Option<Eigen3>> = (0..k_frames)
        .map(|t| skin_correlation(patches.frame(t)).and_then(Eigen3::new))
        .collect();

    let mut skipped = 0usize;
    let mut sr0 = vec![0.0f64; l];
    let mut sr1 = vec![0.0f64; l];
    'windows: for k in l..k_frames {
        let tau = k - l;
        let Some(base) = eigs[tau].filter(is_well_conditioned) else {
            skipped += 1;
            continue;
        };
        let u1 = base.vector(1);
        let u2 = base.vector(2);

        for t in tau..k {
            let Some(frame) = eigs[t] else {
                skipped += 1;
                continue 'windows;
            };
            let u0 = frame.vector(0);
            let s1 = (frame.values[0] / base.values[1]).sqrt() * u0.dot(&u1);
            let s2 = (frame.values[0] / base.values[2]).sqrt() * u0.dot(&u2);
            let back = u1 * s1 + u2 * s2;
            sr0[t - tau] = back[0];
            sr1[t - tau] = back[1];
        }

        let std1 = stats::std_f64(&sr1);
        if !(std1 > 0.0) {
            skipped += 1;
            continue;
        }
        let ratio = stats::std_f64(&sr0) / std1;
        let p: Vec<f64> = sr0.iter().zip(&sr1).map(|(a, b)| a - ratio * b).collect();
        let mean = p.iter().sum::<f64>() / l as f64;
        for (i, v) in p.iter().enumerate() {
            p_total[tau + i] += v - mean;
        }
    }

    if skipped > 0 {
        log::debug!("SSR skipped {skipped} of {} windows", k_frames - l);
    }
    p_total.into_iter().map(|v| v as f32).collect()
}

/// `VᵀV / N` over pixels whose three channels are all non-zero.
fn skin_correlation(frame: ArrayView3<'_, f32>) -> Option<Matrix3<f64>> {
    let mut c = Matrix3::<f64>::zeros();
    let mut count = 0usize;
    for pixel in frame.rows() {
        if pixel.iter().any(|&v| v == 0.0) {
            continue;
        }
        for i in 0..3 {
            for j in 0..3 {
                c[(i, j)] += pixel[i] as f64 * pixel[j] as f64;
            }
        }
        count += 1;
    }
    (count > 0).then(|| c / count as f64)
}

fn is_well_conditioned(eig: &Eigen3) -> bool {
    let floor = DEGENERATE_RATIO * eig.values[0];
    eig.values[0] > 0.0 && eig.values[1] > floor && eig.values[2] > floor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::spectrum::amplitude_spectrum;
    use ndarray::Array4;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f32::consts::PI;

    fn skin_patches(n: usize, size: usize, seed: u64) -> PatchStack {
        let mut rng = StdRng::seed_from_u64(seed);
        let base = [150.0f32, 110.0, 90.0];
        let gain = [0.6f32, 2.0, 0.4];
        let frames = Array4::from_shape_fn((n, size, size, 3), |(t, _, _, c)| {
            let pulse = (2.0 * PI * 1.2 * t as f32 / 30.0).sin();
            base[c] + gain[c] * pulse + 2.0 * rng.gen_range(-1.0f32..1.0)
        });
        PatchStack::new(frames).unwrap()
    }

    #[test]
    fn test_ssr_length_and_finite() {
        let patches = skin_patches(90, 8, 4);
        let out = ssr(&patches, 30.0, 1.0);
        assert_eq!(out.len(), 90);
        assert!(out.iter().all(|v| v.is_finite()));
        assert!(out.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_ssr_pulse_dominates_spectrum() {
        let patches = skin_patches(300, 16, 9);
        let out = ssr(&patches, 30.0, 1.0);
        let spectrum = amplitude_spectrum(out.view(), 30.0);
        let mags = spectrum.magnitudes();
        let peak = (5..34).max_by(|&a, &b| mags[a].total_cmp(&mags[b])).unwrap();
        assert!((11..=13).contains(&peak), "peak bin {peak}");
    }

    #[test]
    fn test_ssr_without_skin_is_flat() {
        let patches = PatchStack::new(Array4::zeros((60, 4, 4, 3))).unwrap();
        assert!(ssr(&patches, 30.0, 1.0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_ssr_too_short_is_flat() {
        let patches = skin_patches(20, 4, 1);
        assert!(ssr(&patches, 30.0, 1.0).iter().all(|&v| v == 0.0));
    }
}
