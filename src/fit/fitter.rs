//! Nonlinear fit of a single model kind.
//!
//! Given:
//! - positions `x_i`
//! - observed intensities `y_i`
//! - a model kind and its starting parameters
//!
//! we minimize `Σ (model(x_i; p) - y_i)²` with Levenberg–Marquardt and derive:
//! - `chisqr`, `redchi = chisqr / max(1, n - k)`
//! - `aic = n ln(chisqr/n) + 2k`, `bic = n ln(chisqr/n) + k ln n`
//! - standard errors `√(diag((JᵀJ)⁻¹) · redchi)`

use crate::domain::{FitConfig, FitQuality, FitResult, ModelKind, NanPolicy, ParamEstimate};
use crate::error::AppError;
use crate::math::{LmSettings, NonFinite, covariance, levenberg_marquardt};
use crate::models::{defaults, predict, predict_all};

/// Options that affect how a model is calibrated.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub nan_policy: NanPolicy,
    /// Starting values in `param_names` order.
    pub initial: Vec<f64>,
    /// `None` uses `2000·(k + 1)`.
    pub max_nfev: Option<usize>,
}

impl FitOptions {
    /// Model defaults with no overrides.
    pub fn for_model(model: ModelKind) -> Self {
        Self {
            nan_policy: model.default_nan_policy(),
            initial: defaults(model).to_vec(),
            max_nfev: None,
        }
    }

    /// Resolve per-model options from the run configuration.
    pub fn from_config(model: ModelKind, config: &FitConfig) -> Result<Self, AppError> {
        Ok(Self {
            nan_policy: config.nan_policy.unwrap_or_else(|| model.default_nan_policy()),
            initial: resolve_initial(model, &config.initial)?,
            max_nfev: config.max_nfev,
        })
    }
}

/// Apply `name=value` overrides to the model defaults.
pub fn resolve_initial(model: ModelKind, overrides: &[(String, f64)]) -> Result<Vec<f64>, AppError> {
    let names = model.param_names();
    let mut values = defaults(model).to_vec();
    for (name, value) in overrides {
        let Some(idx) = names.iter().position(|n| n == name) else {
            return Err(AppError::new(
                2,
                format!(
                    "Unknown parameter '{name}' for model {} (expected one of: {}).",
                    model.display_name(),
                    names.join(", ")
                ),
            ));
        };
        if !value.is_finite() {
            return Err(AppError::new(2, format!("Initial value for '{name}' must be finite.")));
        }
        values[idx] = *value;
    }
    Ok(values)
}

/// Fit `model` to `(xs, ys)`.
pub fn fit_model(model: ModelKind, xs: &[f64], ys: &[f64], opts: &FitOptions) -> Result<FitResult, AppError> {
    if xs.len() != ys.len() {
        return Err(AppError::new(
            3,
            format!(
                "Fit positions ({}) and samples ({}) differ in length.",
                xs.len(),
                ys.len()
            ),
        ));
    }
    let k = model.param_count();
    if opts.initial.len() != k {
        return Err(AppError::new(
            4,
            format!(
                "Model {} expects {k} parameters, got {}.",
                model.display_name(),
                opts.initial.len()
            ),
        ));
    }

    let (xs, ys) = apply_nan_policy(xs, ys, opts.nan_policy)?;
    let n = xs.len();
    if n == 0 {
        return Err(AppError::new(3, "No data points to fit."));
    }
    if n < k {
        return Err(AppError::new(
            3,
            format!(
                "Underdetermined: {n} samples for {k} parameters of model {}.",
                model.display_name()
            ),
        ));
    }

    if predict_all(model, &xs, &opts.initial).iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(
            4,
            format!(
                "Model {} is not finite at the initial parameters (set a start value with --param).",
                model.display_name()
            ),
        ));
    }

    let mut settings = LmSettings::for_params(k);
    if let Some(max_nfev) = opts.max_nfev {
        settings.max_nfev = max_nfev.max(1);
    }

    let residuals = |p: &[f64]| -> Vec<f64> {
        xs.iter()
            .zip(ys.iter())
            .map(|(&x, &y)| predict(model, x, p) - y)
            .collect()
    };
    let non_finite = match opts.nan_policy {
        NanPolicy::Raise => NonFinite::Abort,
        NanPolicy::Propagate | NanPolicy::Omit => NonFinite::Reject,
    };
    let report = levenberg_marquardt(residuals, &opts.initial, &settings, non_finite)?;

    if !report.termination.converged() {
        log::warn!(
            "{} fit stopped early: {} (nfev={})",
            model.display_name(),
            report.termination.describe(),
            report.nfev
        );
    }

    let chisqr = report.cost;
    let nfree = n - k;
    let redchi = chisqr / nfree.max(1) as f64;
    let (aic, bic) = information_criteria(n, k, chisqr);

    let stderrs = standard_errors(&report.jacobian, redchi, nfree);
    let params = model
        .param_names()
        .iter()
        .enumerate()
        .map(|(i, name)| ParamEstimate {
            name: (*name).to_string(),
            value: report.params[i],
            stderr: stderrs.as_ref().and_then(|s| s[i]),
            init: opts.initial[i],
        })
        .collect();

    log::debug!(
        "{} fit: chisqr={chisqr:.6e} redchi={redchi:.6e} nfev={}",
        model.display_name(),
        report.nfev
    );

    Ok(FitResult {
        model,
        params,
        quality: FitQuality {
            ndata: n,
            nvarys: k,
            chisqr,
            redchi,
            aic,
            bic,
            nfev: report.nfev,
            termination: report.termination,
        },
    })
}

/// `raise` and `propagate` both refuse non-finite data: a NaN sample makes
/// every chi-square NaN, so there is nothing to minimize. They differ in how
/// non-finite model values during the iteration are handled.
fn apply_nan_policy(xs: &[f64], ys: &[f64], policy: NanPolicy) -> Result<(Vec<f64>, Vec<f64>), AppError> {
    match policy {
        NanPolicy::Raise | NanPolicy::Propagate => {
            if let Some(i) = xs
                .iter()
                .zip(ys.iter())
                .position(|(x, y)| !x.is_finite() || !y.is_finite())
            {
                let (name, hint) = match policy {
                    NanPolicy::Propagate => ("propagate", "; use --nan-policy omit to drop it"),
                    _ => ("raise", ""),
                };
                return Err(AppError::new(
                    3,
                    format!("Non-finite value at window sample {i} (nan policy: {name}){hint}."),
                ));
            }
            Ok((xs.to_vec(), ys.to_vec()))
        }
        NanPolicy::Omit => Ok(xs
            .iter()
            .zip(ys.iter())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(&x, &y)| (x, y))
            .unzip()),
    }
}

fn information_criteria(n: usize, k: usize, chisqr: f64) -> (f64, f64) {
    let n_f = n as f64;
    let per = (chisqr / n_f).max(f64::MIN_POSITIVE);
    let base = n_f * per.ln();
    (base + 2.0 * k as f64, base + n_f.ln() * k as f64)
}

/// Per-parameter standard errors, or `None` when `JᵀJ` is singular.
fn standard_errors(jacobian: &nalgebra::DMatrix<f64>, redchi: f64, nfree: usize) -> Option<Vec<Option<f64>>> {
    if nfree == 0 || !redchi.is_finite() {
        return None;
    }
    let cov = covariance(jacobian)?;
    Some(
        (0..cov.nrows())
            .map(|i| {
                let var = cov[(i, i)] * redchi;
                if var.is_finite() && var >= 0.0 {
                    Some(var.sqrt())
                } else {
                    None
                }
            })
            .collect(),
    )
}
