//! Blind source separation by PCA and ICA.
//!
//! Both treat the three colour channels as mixtures and hand out one
//! designated component (by default the second) as the pulse-bearing
//! source. Both are deterministic: PCA fixes eigenvector signs by their
//! largest loading, ICA starts FastICA from the identity and fixes the
//! output sign against the green channel.
//!
//! # References
//! - Lewandowska et al. (2011): "Measuring pulse rate with a webcam: a non-contact method for evaluating cardiac activity"
//! - Poh, McDuff & Picard (2010): "Non-contact, automated cardiac pulse measurements using video imaging and blind source separation"
//! - Hyvärinen (1999): "Fast and robust fixed-point algorithms for independent component analysis"

use nalgebra::{DMatrix, DVector, Matrix3, SymmetricEigen};
use ndarray::{Array1, ArrayView2};

use super::linalg::{gram3, to_matrix, Eigen3};
use crate::trace::GREEN;

/// Relative eigenvalue floor below which a direction carries no variance.
const RANK_TOLERANCE: f64 = 1e-10;

/// Principal component `component` of the three channel observations,
/// scaled by its explained variance.
///
/// Each frame (column) is centred across the three channels, so at most two
/// components carry variance. `None` when the requested one does not.
pub fn pca(channels: ArrayView2<'_, f32>, component: usize) -> Option<Array1<f32>> {
    let mut x = to_matrix(channels);
    if component > 2 || x.ncols() == 0 {
        return None;
    }
    for mut col in x.column_iter_mut() {
        let m = col.mean();
        col.add_scalar_mut(-m);
    }

    let eig = Eigen3::new(gram3(&x))?;
    let lambda = eig.values[component];
    if !(lambda > RANK_TOLERANCE * eig.values[0].max(f64::MIN_POSITIVE)) {
        return None;
    }
    let singular = lambda.sqrt();
    // Explained variance over 3 observations: s^2 / (3 - 1)
    let explained = lambda / 2.0;
    let u = eig.vector(component);

    Some(
        x.column_iter()
            .map(|col| (u.dot(&col) / singular * explained) as f32)
            .collect(),
    )
}

#[derive(Debug, Clone)]
pub struct IcaParams {
    /// Zero-based source index, after ordering by mixing energy
    pub component: usize,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for IcaParams {
    fn default() -> Self {
        Self {
            component: 1,
            max_iter: 200,
            tolerance: 1e-4,
        }
    }
}

/// FastICA (symmetric, tanh contrast) over the three channels.
///
/// Sources are ordered by the energy of their mixing-matrix column, largest
/// first, and the requested one is returned with unit variance, signed to
/// correlate non-negatively with the green channel.
pub fn ica(channels: ArrayView2<'_, f32>, params: &IcaParams) -> Option<Array1<f32>> {
    let mut x = to_matrix(channels);
    let t = x.ncols();
    if t < 3 {
        return None;
    }
    for mut row in x.row_iter_mut() {
        let m = row.mean();
        row.add_scalar_mut(-m);
    }

    let cov: Matrix3<f64> = gram3(&x) / t as f64;
    let eig = Eigen3::new(cov)?;
    let top = eig.values[0];
    if !(top > 0.0) {
        return None;
    }
    let k = eig.values.iter().filter(|&&v| v > RANK_TOLERANCE * top).count();
    if k <= params.component {
        return None;
    }

    // Whitening: z = D^-1/2 Eᵀ x over the k significant directions
    let whitening = DMatrix::from_fn(k, 3, |i, j| eig.vectors[(j, i)] / eig.values[i].sqrt());
    let z = &whitening * &x;

    let mut w = DMatrix::<f64>::identity(k, k);
    let mut converged = false;
    for _ in 0..params.max_iter {
        let wz = &w * &z;
        let g = wz.map(f64::tanh);
        let g_prime_mean = DVector::from_fn(k, |i, _| {
            g.row(i).iter().map(|v| 1.0 - v * v).sum::<f64>() / t as f64
        });
        let w_next = (&g * z.transpose()) / t as f64 - DMatrix::from_diagonal(&g_prime_mean) * &w;
        let w_next = symmetric_decorrelation(&w_next)?;

        let lim = (0..k)
            .map(|i| (w_next.row(i).dot(&w.row(i)).abs() - 1.0).abs())
            .fold(0.0f64, f64::max);
        w = w_next;
        if lim < params.tolerance {
            converged = true;
            break;
        }
    }
    if !converged {
        log::debug!("FastICA stopped after {} iterations without converging", params.max_iter);
    }

    // Mixing column j of E_k D^1/2 Wᵀ has squared norm sum_i lambda_i W[j,i]^2
    let energy: Vec<f64> = (0..k)
        .map(|j| (0..k).map(|i| eig.values[i] * w[(j, i)] * w[(j, i)]).sum())
        .collect();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| energy[b].total_cmp(&energy[a]));
    let source_idx = order[params.component];

    let sources = &w * &z;
    let mut source: Vec<f64> = sources.row(source_idx).iter().copied().collect();
    let green_corr: f64 = source.iter().zip(x.row(GREEN).iter()).map(|(s, g)| s * g).sum();
    if green_corr < 0.0 {
        source.iter_mut().for_each(|v| *v = -*v);
    }

    Some(source.into_iter().map(|v| v as f32).collect())
}

/// `(W Wᵀ)^-1/2 W`
fn symmetric_decorrelation(w: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let eig = SymmetricEigen::new(w * w.transpose());
    if eig.eigenvalues.iter().any(|&v| !(v > 0.0) || !v.is_finite()) {
        return None;
    }
    let inv_sqrt = DMatrix::from_diagonal(&eig.eigenvalues.map(|v| 1.0 / v.sqrt()));
    Some(&eig.eigenvectors * inv_sqrt * eig.eigenvectors.transpose() * w)
}
