//! Covariance helpers for the row-level detectors.
//!
//! Inversion goes through a Cholesky factorization from `linfa-linalg`; a
//! covariance matrix that is not safely positive definite counts as singular.

use linfa_linalg::cholesky::{Cholesky as _, InverseC as _};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Smallest pivot, relative to the largest variance, still treated as non-zero.
const SINGULAR_EPS: f64 = 1e-12;

/// Column means of an `n × p` matrix.
pub fn column_means(data: &Array2<f64>) -> Array1<f64> {
    data.mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(data.ncols()))
}

/// Maximum-likelihood covariance (divides by `n`).
pub fn covariance(data: &Array2<f64>, mean: &Array1<f64>) -> Array2<f64> {
    let n = data.nrows().max(1) as f64;
    let centered = data - mean;
    centered.t().dot(&centered) / n
}

fn cholesky_factor(cov: &Array2<f64>) -> Option<Array2<f64>> {
    let lower = cov.cholesky().ok()?;
    let scale = cov.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let degenerate = lower.diag().iter().any(|d| d * d <= SINGULAR_EPS * scale);
    (!degenerate).then_some(lower)
}

/// Inverse and determinant of a covariance matrix. `None` when singular.
pub fn invert_with_determinant(cov: &Array2<f64>) -> Option<(Array2<f64>, f64)> {
    let lower = cholesky_factor(cov)?;
    let det = lower.diag().iter().map(|d| d * d).product();
    let inverse = cov.invc().ok()?;
    Some((inverse, det))
}

/// Inverse of a covariance matrix. `None` when singular.
pub fn invert(cov: &Array2<f64>) -> Option<Array2<f64>> {
    invert_with_determinant(cov).map(|(inverse, _)| inverse)
}

/// Squared Mahalanobis distance of `x` given a mean and an inverse covariance.
pub fn mahalanobis_sq(x: ArrayView1<'_, f64>, mean: &Array1<f64>, inv_cov: &Array2<f64>) -> f64 {
    let d = &x - mean;
    d.dot(&inv_cov.dot(&d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_inverse_of_known_covariance() {
        let m = array![[4.0, 2.0], [2.0, 3.0]];
        let (inv, det) = invert_with_determinant(&m).expect("positive definite");
        let expected = array![[0.375, -0.25], [-0.25, 0.5]];
        for (a, b) in inv.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!((det - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_covariance_has_no_inverse() {
        assert!(invert(&array![[1.0, 2.0], [2.0, 4.0]]).is_none());
        assert!(invert(&array![[0.0, 0.0], [0.0, 0.0]]).is_none());
        // Collinear up to rounding
        let data = array![[1.0, 3.0], [2.0, 6.0], [3.0, 9.000_000_000_000_002]];
        assert!(invert(&covariance(&data, &column_means(&data))).is_none());
    }

    #[test]
    fn test_mahalanobis_reduces_to_euclidean_for_identity() {
        let mean = array![0.0, 0.0];
        let inv = Array2::<f64>::eye(2);
        let x = array![3.0, 4.0];
        assert!((mahalanobis_sq(x.view(), &mean, &inv) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_covariance_is_population() {
        let data = array![[1.0, 2.0], [3.0, 6.0]];
        let mean = column_means(&data);
        let cov = covariance(&data, &mean);
        assert!((cov[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((cov[[0, 1]] - 2.0).abs() < 1e-12);
    }
}
