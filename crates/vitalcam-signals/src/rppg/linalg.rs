//! Small dense linear-algebra helpers shared by the projection and
//! decomposition methods. Everything runs in f64.

use nalgebra::{DMatrix, Matrix3, SymmetricEigen, Vector3};
use ndarray::{Array1, ArrayView2};

/// Copy a `3 × T` channel view into an f64 matrix.
pub(crate) fn to_matrix(channels: ArrayView2<'_, f32>) -> DMatrix<f64> {
    let (rows, cols) = channels.dim();
    DMatrix::from_fn(rows, cols, |i, j| channels[[i, j]] as f64)
}

/// `X · Xᵀ` of a `3 × T` matrix.
pub(crate) fn gram3(x: &DMatrix<f64>) -> Matrix3<f64> {
    let g = x * x.transpose();
    Matrix3::from_fn(|i, j| g[(i, j)])
}

/// Row `i` of a matrix as an f32 waveform.
pub(crate) fn row_to_array(m: &DMatrix<f64>, i: usize) -> Array1<f32> {
    m.row(i).iter().map(|&v| v as f32).collect()
}

/// Eigen-decomposition of a symmetric 3×3 matrix, eigenvalues descending.
///
/// Each eigenvector (column) is signed so that its largest-magnitude entry is
/// positive, which makes the result independent of the solver's sign choice.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Eigen3 {
    pub values: [f64; 3],
    pub vectors: Matrix3<f64>,
}

impl Eigen3 {
    pub fn new(m: Matrix3<f64>) -> Option<Self> {
        if !m.iter().all(|v| v.is_finite()) {
            return None;
        }
        let eig = SymmetricEigen::new(m);
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

        let mut values = [0.0; 3];
        let mut vectors = Matrix3::zeros();
        for (dst, &src) in order.iter().enumerate() {
            values[dst] = eig.eigenvalues[src];
            let mut v: Vector3<f64> = eig.eigenvectors.column(src).into_owned();
            fix_sign(&mut v);
            vectors.set_column(dst, &v);
        }
        if !values.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Self { values, vectors })
    }

    pub fn vector(&self, i: usize) -> Vector3<f64> {
        self.vectors.column(i).into_owned()
    }
}

/// Flip `v` so its largest-magnitude component is positive.
pub(crate) fn fix_sign(v: &mut Vector3<f64>) {
    let pivot = v.iamax();
    if v[pivot] < 0.0 {
        v.neg_mut();
    }
}

/// `I - s sᵀ` for a unit vector `s`.
pub(crate) fn orthogonal_projector(s: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::identity() - s * s.transpose()
}

/// Apply a 3×3 matrix to a `3 × T` matrix.
pub(crate) fn apply3(p: &Matrix3<f64>, x: &DMatrix<f64>) -> DMatrix<f64> {
    let p = DMatrix::from_fn(3, 3, |i, j| p[(i, j)]);
    p * x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_eigen_sorted_and_signed() {
        let m = Matrix3::new(1.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 3.0);
        let eig = Eigen3::new(m).unwrap();
        assert_relative_eq!(eig.values[0], 5.0, epsilon = 1e-12);
        assert_relative_eq!(eig.values[1], 3.0, epsilon = 1e-12);
        assert_relative_eq!(eig.values[2], 1.0, epsilon = 1e-12);
        assert_relative_eq!(eig.vector(0)[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(eig.vector(1)[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_eigen_rejects_non_finite() {
        let mut m = Matrix3::identity();
        m[(0, 0)] = f64::NAN;
        assert!(Eigen3::new(m).is_none());
    }

    #[test]
    fn test_projector_removes_direction() {
        let s = Vector3::new(1.0, 1.0, 1.0).normalize();
        let p = orthogonal_projector(&s);
        let projected = p * Vector3::new(2.0, 2.0, 2.0);
        assert_relative_eq!(projected.norm(), 0.0, epsilon = 1e-12);
    }
}
