//! Least squares solvers.
//!
//! The imputer repeatedly solves small regressions of one label on the
//! others:
//!
//! ```text
//! minimize ||y - Xβ||² + λ||β||²
//! ```
//!
//! Implementation choices:
//! - Ridge is expressed as ordinary least squares on an augmented system
//!   (`[X; √λ I]`, `[y; 0]`) so a single SVD-based solver covers both.
//! - SVD handles tall and rank-deficient designs; nalgebra's `QR::solve` is
//!   meant for square systems.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Ridge regression without intercept (callers center `y`).
pub fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let (n, p) = x.shape();
    if p == 0 {
        return Some(DVector::zeros(0));
    }
    if lambda <= 0.0 {
        return solve_least_squares(x, y);
    }

    let penalty = lambda.sqrt();
    let augmented = DMatrix::from_fn(n + p, p, |r, c| {
        if r < n {
            x[(r, c)]
        } else if r - n == c {
            penalty
        } else {
            0.0
        }
    });
    let target = DVector::from_fn(n + p, |r, _| if r < n { y[r] } else { 0.0 });

    solve_least_squares(&augmented, &target)
}
