//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::app::pipeline::{PreparedProfile, RunOutput};
use crate::domain::{FitResult, FitWindow, RangeEstimate, WindowSource};
use crate::fit::Comparison;

/// Format the full run summary (profile, window, parameters, headline range).
pub fn format_run_summary(run: &RunOutput) -> String {
    let mut out = String::new();

    out.push_str("=== falloff - range fit ===\n");
    out.push_str(&format_prepared(&run.prepared));
    out.push_str(&format!("Model: {}\n", run.fit.model.display_name()));

    out.push_str("\nParameters:\n");
    out.push_str(&format_param_table(&run.fit));

    let q = &run.fit.quality;
    out.push_str(&format!(
        "\nQuality: n={} k={} chisqr={:.6e} redchi={:.6e} aic={:.3} bic={:.3}\n",
        q.ndata, q.nvarys, q.chisqr, q.redchi, q.aic, q.bic
    ));
    out.push_str(&format!("Solver: nfev={} ({})\n", q.nfev, q.termination.describe()));

    out.push('\n');
    out.push_str(&format_range(&run.range()));
    out.push('\n');
    out
}

/// Profile, phantom, grid and window lines shared by `fit` and `compare`.
pub fn format_prepared(prepared: &PreparedProfile) -> String {
    let mut out = String::new();
    out.push_str(&format!("Source: {}\n", prepared.profile.source.display()));
    out.push_str(&format!("Phantom: {}\n", prepared.phantom.display_name()));
    if let (Some(first), Some(last)) = (prepared.grid.first(), prepared.grid.last()) {
        out.push_str(&format!(
            "Grid: {} bins | x=[{first:.3}, {last:.3}] mm\n",
            prepared.grid.len()
        ));
    }
    out.push_str(&format!(
        "Window: {} | n={}\n",
        format_window(&prepared.window),
        prepared.selection.samples.len()
    ));
    out
}

/// `[start, stop] mm` with where it came from.
pub fn format_window(window: &FitWindow) -> String {
    let origin = match window.source {
        WindowSource::Explicit => "explicit".to_string(),
        WindowSource::PeakOffset { peak } => format!("peak at {peak:.3}"),
        WindowSource::FalloffOffset { falloff } => format!("falloff at {falloff:.3}"),
    };
    format!("[{:.3}, {:.3}] mm ({origin})", window.start, window.stop)
}

/// The headline line: `z = … ± … mm, chisqr = …`.
pub fn format_range(range: &RangeEstimate) -> String {
    let stderr = range
        .z_stderr
        .map(|s| format!("{s:.4}"))
        .unwrap_or_else(|| "n/a".to_string());
    format!("z = {:.4} ± {stderr} mm, chisqr = {:.6e}", range.z, range.chisqr)
}

/// Parameter table: name, value, stderr, initial value.
pub fn format_param_table(fit: &FitResult) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<6} {:>14} {:>12} {:>10}", "name", "value", "stderr", "init").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<6} {:-<14} {:-<12} {:-<10}", "", "", "", "").trim_end());
    out.push('\n');

    for p in &fit.params {
        let stderr = p.stderr.map(|s| format!("{s:.6}")).unwrap_or_else(|| "n/a".to_string());
        out.push_str(format!("{:<6} {:>14.6} {:>12} {:>10.4}", p.name, p.value, stderr, p.init).trim_end());
        out.push('\n');
    }
    out
}

/// Comparison table for `falloff compare`, best model first.
pub fn format_comparison(prepared: &PreparedProfile, comparison: &Comparison) -> String {
    let mut out = String::new();
    out.push_str("=== falloff - model comparison ===\n");
    out.push_str(&format_prepared(prepared));
    out.push('\n');

    out.push_str(
        format!(
            "  {:<18} {:>10} {:>10} {:>12} {:>10} {:>10}",
            "model", "z", "stderr", "chisqr", "aic", "bic"
        )
        .trim_end(),
    );
    out.push('\n');

    for (i, fit) in comparison.ranked.iter().enumerate() {
        let marker = if i == 0 { "*" } else { " " };
        let range = fit.range_estimate();
        let stderr = range
            .z_stderr
            .map(|s| format!("{s:.4}"))
            .unwrap_or_else(|| "n/a".to_string());
        out.push_str(
            format!(
                "{marker} {:<18} {:>10.4} {:>10} {:>12.4e} {:>10.3} {:>10.3}",
                fit.model.display_name(),
                range.z,
                stderr,
                range.chisqr,
                fit.quality.aic,
                fit.quality.bic
            )
            .trim_end(),
        );
        out.push('\n');
    }
    for (model, reason) in &comparison.failed {
        out.push_str(&format!("  (failed {}) {reason}\n", model.display_name()));
    }
    out
}
