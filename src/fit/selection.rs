//! Multi-model comparison on a single window.
//!
//! Every requested model is fit on the same positions and samples. Ranking:
//! 1. Skip underdetermined models: require `n >= k + 1`
//! 2. Order successful fits by BIC, ties broken by chi-square
//!
//! Failed fits are kept with their error message so the report can list them.

use rayon::prelude::*;

use crate::domain::{FitConfig, FitResult, ModelKind};
use crate::error::AppError;
use crate::fit::fitter::{FitOptions, fit_model};

/// Output of fitting several models and ranking them.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Successful fits, best first.
    pub ranked: Vec<FitResult>,
    /// Models that were skipped or failed, with the reason.
    pub failed: Vec<(ModelKind, String)>,
}

impl Comparison {
    pub fn best(&self) -> Option<&FitResult> {
        self.ranked.first()
    }
}

/// Fit each of `models` on `(xs, ys)` in parallel and rank the results.
pub fn compare_models(
    models: &[ModelKind],
    xs: &[f64],
    ys: &[f64],
    config: &FitConfig,
) -> Result<Comparison, AppError> {
    if models.is_empty() {
        return Err(AppError::new(2, "No models requested for comparison."));
    }

    let n = xs.len();
    let outcomes: Vec<(ModelKind, Result<FitResult, AppError>)> = models
        .par_iter()
        .map(|&model| {
            let k = model.param_count();
            if n < k + 1 {
                let msg = format!("Underdetermined: n={n} < k+1={}", k + 1);
                return (model, Err(AppError::new(3, msg)));
            }
            // Overrides naming parameters the model lacks are ignored here.
            let mut config = config.clone();
            config
                .initial
                .retain(|(name, _)| model.param_names().contains(&name.as_str()));
            let outcome = FitOptions::from_config(model, &config).and_then(|opts| fit_model(model, xs, ys, &opts));
            (model, outcome)
        })
        .collect();

    let mut ranked = Vec::new();
    let mut failed = Vec::new();
    for (model, outcome) in outcomes {
        match outcome {
            Ok(fit) => ranked.push(fit),
            Err(err) => {
                log::info!("{} skipped: {err}", model.display_name());
                failed.push((model, err.message().to_string()));
            }
        }
    }

    if ranked.is_empty() {
        return Err(AppError::new(4, "No model could be fit to this window."));
    }

    rank_by_bic(&mut ranked);
    Ok(Comparison { ranked, failed })
}

fn rank_by_bic(fits: &mut [FitResult]) {
    fits.sort_by(|a, b| {
        a.quality
            .bic
            .total_cmp(&b.quality.bic)
            .then(a.quality.chisqr.total_cmp(&b.quality.chisqr))
    });
}
