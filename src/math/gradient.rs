//! Numerical gradient on a (possibly non-uniform) grid.
//!
//! Interior points use the second-order accurate three-point formula
//!
//! ```text
//! f'(x_i) ≈ (h_s² f_{i+1} + (h_d² - h_s²) f_i - h_d² f_{i-1}) / (h_s h_d (h_s + h_d))
//! ```
//!
//! with `h_s = x_i - x_{i-1}` and `h_d = x_{i+1} - x_i`. The end points use
//! first-order one-sided differences.

use crate::error::AppError;

/// Gradient of `y` with respect to `x`.
pub fn gradient(y: &[f64], x: &[f64]) -> Result<Vec<f64>, AppError> {
    let n = y.len();
    if n != x.len() {
        return Err(AppError::new(
            4,
            format!("Gradient input length mismatch: {} values vs {} positions.", n, x.len()),
        ));
    }
    if n < 2 {
        return Err(AppError::new(
            3,
            format!("Gradient needs at least 2 samples, got {n}."),
        ));
    }

    let mut out = vec![0.0; n];
    out[0] = (y[1] - y[0]) / (x[1] - x[0]);
    out[n - 1] = (y[n - 1] - y[n - 2]) / (x[n - 1] - x[n - 2]);

    for i in 1..n - 1 {
        let hs = x[i] - x[i - 1];
        let hd = x[i + 1] - x[i];
        let num = hs * hs * y[i + 1] + (hd * hd - hs * hs) * y[i] - hd * hd * y[i - 1];
        out[i] = num / (hs * hd * (hs + hd));
    }

    Ok(out)
}
