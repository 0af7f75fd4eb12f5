//! Parameter covariance from the Jacobian at the solution.
//!
//! `cov = (JᵀJ)⁻¹`, scaled by the reduced chi-square by the caller. Cholesky is
//! tried first; badly scaled Jacobians (e.g. a Hill exponent of 15) can break it
//! numerically, so a general inverse is the fallback.

use nalgebra::DMatrix;

/// `(JᵀJ)⁻¹`, or `None` when `JᵀJ` is singular.
pub fn covariance(jacobian: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let jtj = jacobian.transpose() * jacobian;
    let inv = match jtj.clone().cholesky() {
        Some(chol) => chol.inverse(),
        None => jtj.try_inverse()?,
    };
    inv.iter().all(|v| v.is_finite()).then_some(inv)
}
