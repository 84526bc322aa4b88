//! Projection methods: LGI, OMIT and PBV.
//!
//! LGI and OMIT remove an estimated illumination/specular direction from the
//! RGB trace and read the pulse from the green row of the projected signal.
//! PBV projects onto the direction of the normalised blood-volume signature.
//!
//! # References
//! - Pilz et al. (2018): "Local Group Invariance for Heart Rate Estimation from Face Videos"
//! - Casado & López (2023): "Face2PPG: An unsupervised pipeline for blood volume pulse extraction"
//! - De Haan & van Leest (2014): "Improved motion robustness of remote-PPG by using the blood volume pulse signature"

use nalgebra::{Matrix3, Vector3};
use ndarray::{Array1, ArrayView2};

use super::linalg::{apply3, gram3, orthogonal_projector, row_to_array, to_matrix, Eigen3};
use crate::trace::GREEN;

/// Local Group Invariance.
///
/// `S` is the dominant left singular vector of the trace (the dominant
/// eigenvector of `X Xᵀ`); the pulse is the green row of `(I - S Sᵀ) X`.
pub fn lgi(channels: ArrayView2<'_, f32>) -> Option<Array1<f32>> {
    let x = to_matrix(channels);
    let eig = Eigen3::new(gram3(&x))?;
    let p = orthogonal_projector(&eig.vector(0));
    Some(row_to_array(&apply3(&p, &x), GREEN))
}

/// Orthogonal Matrix Image Transformation.
///
/// `q` is the first column of the QR factor of the trace, i.e. the first
/// RGB sample normalised; the pulse is the green row of `(I - q qᵀ) X`.
/// A zero first sample gives `q = e1`.
pub fn omit(channels: ArrayView2<'_, f32>) -> Option<Array1<f32>> {
    let x = to_matrix(channels);
    if x.ncols() == 0 {
        return Some(Array1::zeros(0));
    }
    let first = Vector3::new(x[(0, 0)], x[(1, 0)], x[(2, 0)]);
    let norm = first.norm();
    let q = if norm > f64::EPSILON {
        first / norm
    } else {
        Vector3::x()
    };
    let p = orthogonal_projector(&q);
    Some(row_to_array(&apply3(&p, &x), GREEN))
}

/// Blood-volume pulse signature method.
///
/// Channels are divided by their means, the signature is
/// `pbv = std(C) / sqrt(sum var(C))`, and the pulse is
/// `Cᵀ W / (pbvᵀ W)` with `W = (C Cᵀ)⁻¹ pbv`. `None` when a channel mean is
/// zero or `C Cᵀ` is singular.
pub fn pbv(channels: ArrayView2<'_, f32>) -> Option<Array1<f32>> {
    let mut c = to_matrix(channels);
    let t = c.ncols();
    if t == 0 {
        return None;
    }

    let mut signature = Vector3::zeros();
    let mut var_sum = 0.0;
    for i in 0..3 {
        let mean = c.row(i).mean();
        if mean == 0.0 || !mean.is_finite() {
            return None;
        }
        let mut row = c.row_mut(i);
        row /= mean;
        let m = row.mean();
        let var = row.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / t as f64;
        signature[i] = var.sqrt();
        var_sum += var;
    }
    if !(var_sum > 0.0) {
        return None;
    }
    signature /= var_sum.sqrt();

    let q: Matrix3<f64> = gram3(&c);
    // Reject numerically singular systems before solving
    if q.determinant().abs() <= f64::EPSILON * q.norm().powi(3) {
        return None;
    }
    let w = q.lu().solve(&signature)?;
    let denom = signature.dot(&w);
    if denom.abs() <= f64::EPSILON {
        return None;
    }
    let w = w / denom;

    Some(
        (0..t)
            .map(|j| (c[(0, j)] * w[0] + c[(1, j)] * w[1] + c[(2, j)] * w[2]) as f32)
            .collect(),
    )
}
