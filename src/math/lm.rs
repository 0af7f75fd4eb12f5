//! Levenberg–Marquardt fits on top of the `levenberg-marquardt` crate (MINPACK `lmder`).
//!
//! [`ResidualProblem`] wraps a residual function `r: ℝᵐ → ℝⁿ` as a
//! [`LeastSquaresProblem`]. The Jacobian comes from forward differences with
//! step `√ε·|p_k|` (`√ε` when `p_k = 0`), like MINPACK's `lmdif`.
//!
//! Non-finite residuals at a trial point either abort the fit or are replaced
//! by [`REJECT_RESIDUAL`], which makes the solver reject that step.

use std::cell::Cell;

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};

use crate::domain::Termination;
use crate::error::AppError;

const SQRT_EPS: f64 = 1.490_116_119_384_765_6e-8;

/// Stand-in for a non-finite residual when trial points are rejected.
pub const REJECT_RESIDUAL: f64 = 1e100;

/// Solver tolerances and budget.
#[derive(Debug, Clone)]
pub struct LmSettings {
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    /// Residual evaluations allowed, Jacobian columns excluded.
    pub max_nfev: usize,
}

impl LmSettings {
    /// Defaults for a problem with `nvarys` free parameters.
    pub fn for_params(nvarys: usize) -> Self {
        Self {
            ftol: 1.5e-8,
            xtol: 1.5e-8,
            gtol: 1e-14,
            max_nfev: 2000 * (nvarys + 1),
        }
    }

    /// The crate budgets `patience · (m + 1)` evaluations.
    fn patience(&self, nvarys: usize) -> usize {
        self.max_nfev.div_ceil(nvarys + 1).max(1)
    }
}

/// What a non-finite residual does during the iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonFinite {
    /// Stop the fit with an error.
    Abort,
    /// Treat the trial point as a failed step.
    Reject,
}

/// Solver output.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: Vec<f64>,
    /// Residuals at `params`.
    pub residuals: DVector<f64>,
    /// Jacobian at `params`.
    pub jacobian: DMatrix<f64>,
    /// `Σ r²` at `params`.
    pub cost: f64,
    /// Residual evaluations, Jacobian columns included.
    pub nfev: usize,
    pub termination: Termination,
}

/// A residual function with its current parameters.
pub struct ResidualProblem<F> {
    residuals: F,
    params: DVector<f64>,
    non_finite: NonFinite,
    nfev: Cell<usize>,
    aborted: Cell<bool>,
}

impl<F> ResidualProblem<F>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    pub fn new(residuals: F, p0: &[f64], non_finite: NonFinite) -> Self {
        Self {
            residuals,
            params: DVector::from_column_slice(p0),
            non_finite,
            nfev: Cell::new(0),
            aborted: Cell::new(false),
        }
    }

    /// Raw residuals at `p`, counted as one evaluation.
    fn evaluate(&self, p: &[f64]) -> DVector<f64> {
        self.nfev.set(self.nfev.get() + 1);
        DVector::from_vec((self.residuals)(p))
    }

    /// Forward-difference Jacobian around `p`. Non-finite entries are zeroed.
    fn jacobian_at(&self, p: &DVector<f64>, r: &DVector<f64>) -> DMatrix<f64> {
        let n = r.len();
        let m = p.len();
        let mut jac = DMatrix::<f64>::zeros(n, m);

        for k in 0..m {
            let mut h = SQRT_EPS * p[k].abs();
            if h == 0.0 {
                h = SQRT_EPS;
            }
            let mut shifted = p.clone();
            shifted[k] += h;
            let r_k = self.evaluate(shifted.as_slice());

            for i in 0..n.min(r_k.len()) {
                let d = (r_k[i] - r[i]) / h;
                jac[(i, k)] = if d.is_finite() { d } else { 0.0 };
            }
        }

        jac
    }
}

impl<F> LeastSquaresProblem<f64, Dyn, Dyn> for ResidualProblem<F>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, p: &DVector<f64>) {
        self.params.copy_from(p);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let mut r = self.evaluate(self.params.as_slice());
        if r.iter().all(|v| v.is_finite()) {
            return Some(r);
        }
        match self.non_finite {
            NonFinite::Abort => {
                self.aborted.set(true);
                None
            }
            NonFinite::Reject => {
                r.apply(|v| {
                    if !v.is_finite() {
                        *v = REJECT_RESIDUAL;
                    }
                });
                Some(r)
            }
        }
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let r = self.evaluate(self.params.as_slice());
        Some(self.jacobian_at(&self.params, &r))
    }
}

/// Run Levenberg–Marquardt from `p0`.
///
/// Fails when there are no residuals, when the residuals at `p0` are not
/// finite, or when an aborting problem meets a non-finite residual.
pub fn levenberg_marquardt<F>(
    residuals: F,
    p0: &[f64],
    settings: &LmSettings,
    non_finite: NonFinite,
) -> Result<LmReport, AppError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let m = p0.len();
    if m == 0 {
        return Err(AppError::new(4, "No parameters to optimize."));
    }

    let problem = ResidualProblem::new(residuals, p0, non_finite);
    let r0 = problem.evaluate(p0);
    if r0.is_empty() {
        return Err(AppError::new(3, "No residuals to minimize."));
    }
    if r0.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(4, "Residuals are not finite at the initial parameters."));
    }

    let (problem, report) = LevenbergMarquardt::new()
        .with_ftol(settings.ftol)
        .with_xtol(settings.xtol)
        .with_gtol(settings.gtol)
        .with_patience(settings.patience(m))
        .minimize(problem);

    if problem.aborted.get() {
        return Err(AppError::new(
            4,
            "Residuals became non-finite during the fit (nan policy: raise).",
        ));
    }

    let termination = match report.termination {
        TerminationReason::Converged { ftol: true, .. } | TerminationReason::ResidualsZero => {
            Termination::CostConverged
        }
        TerminationReason::Converged { .. } => Termination::StepConverged,
        TerminationReason::Orthogonal => Termination::GradientConverged,
        TerminationReason::LostPatience => Termination::MaxEvaluations,
        TerminationReason::NoImprovementPossible(_) => Termination::NoProgress,
        other => return Err(AppError::new(4, format!("Least-squares solver failed: {other:?}"))),
    };

    let p = problem.params();
    let r = problem.evaluate(p.as_slice());
    let cost = r.norm_squared();
    if !cost.is_finite() {
        return Err(AppError::new(4, "Chi-square is not finite at the solution."));
    }
    let jacobian = problem.jacobian_at(&p, &r);
    let nfev = problem.nfev.get();

    log::debug!(
        "lm finished: {:?} after {} solver evaluations, nfev={nfev}, cost={cost:.6e}",
        report.termination,
        report.number_of_evaluations
    );

    Ok(LmReport {
        params: p.iter().copied().collect(),
        residuals: r,
        jacobian,
        cost,
        nfev,
        termination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_decay_residuals(xs: &[f64], ys: &[f64]) -> impl Fn(&[f64]) -> Vec<f64> {
        let xs = xs.to_vec();
        let ys = ys.to_vec();
        move |p: &[f64]| {
            xs.iter()
                .zip(ys.iter())
                .map(|(&x, &y)| p[0] * (-x / p[1]).exp() - y)
                .collect()
        }
    }

    #[test]
    fn recovers_exponential_decay() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 3.0 * (-x / 2.0).exp()).collect();

        let report = levenberg_marquardt(
            exp_decay_residuals(&xs, &ys),
            &[1.0, 1.0],
            &LmSettings::for_params(2),
            NonFinite::Abort,
        )
        .unwrap();

        assert!(report.termination.converged(), "{:?}", report.termination);
        assert!((report.params[0] - 3.0).abs() < 1e-6);
        assert!((report.params[1] - 2.0).abs() < 1e-6);
        assert!(report.cost < 1e-12);
        assert_eq!(report.jacobian.nrows(), 20);
        assert_eq!(report.jacobian.ncols(), 2);
    }

    #[test]
    fn linear_problem_converges() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 5.0, 7.0];
        let f = |p: &[f64]| -> Vec<f64> {
            xs.iter().zip(ys.iter()).map(|(&x, &y)| p[0] + p[1] * x - y).collect()
        };
        let report = levenberg_marquardt(f, &[0.0, 0.0], &LmSettings::for_params(2), NonFinite::Abort).unwrap();
        assert!((report.params[0] - 1.0).abs() < 1e-6);
        assert!((report.params[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn respects_evaluation_budget() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 5.0 * (-x / 3.0).exp()).collect();
        let settings = LmSettings {
            max_nfev: 3,
            ..LmSettings::for_params(2)
        };
        let report = levenberg_marquardt(exp_decay_residuals(&xs, &ys), &[1.0, 1.0], &settings, NonFinite::Abort)
            .unwrap();
        assert_eq!(report.termination, Termination::MaxEvaluations);
        assert!(report.nfev > 0);
    }

    #[test]
    fn non_finite_start_is_an_error() {
        let f = |_: &[f64]| vec![f64::NAN, 1.0];
        let err = levenberg_marquardt(f, &[1.0], &LmSettings::for_params(1), NonFinite::Reject).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("initial parameters"));
    }

    // r = sqrt(p) - 1 is NaN for p < 0
    fn sqrt_residuals(p: &[f64]) -> Vec<f64> {
        vec![p[0].sqrt() - 1.0, 2.0 * (p[0].sqrt() - 1.0)]
    }

    #[test]
    fn rejecting_problem_substitutes_non_finite_residuals() {
        let mut problem = ResidualProblem::new(sqrt_residuals, &[4.0], NonFinite::Reject);
        problem.set_params(&DVector::from_column_slice(&[-1.0]));
        let r = problem.residuals().unwrap();
        assert!(r.iter().all(|&v| v == REJECT_RESIDUAL));
        assert!(!problem.aborted.get());
    }

    #[test]
    fn aborting_problem_refuses_non_finite_residuals() {
        let mut problem = ResidualProblem::new(sqrt_residuals, &[4.0], NonFinite::Abort);
        problem.set_params(&DVector::from_column_slice(&[-1.0]));
        assert!(problem.residuals().is_none());
        assert!(problem.aborted.get());

        problem.set_params(&DVector::from_column_slice(&[4.0]));
        assert_eq!(problem.residuals().unwrap().len(), 2);
        assert_eq!(problem.nfev.get(), 2);
    }
}
