//! Shared "fit pipeline" logic used by both CLI and TUI front-ends.
//!
//! read -> detect phantom -> grid -> window -> fit -> dense curve
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use std::path::Path;

use crate::domain::{FitConfig, FitResult, FitWindow, PhantomKind, Profile, RangeEstimate, SeriesGrid};
use crate::error::AppError;
use crate::fit::{FitOptions, WindowSelection, default_window, detect_phantom, explicit_window, fit_model, select_window};
use crate::io::read_profile;
use crate::math::{gen_lin, linspace};
use crate::models::predict_all;

/// A profile on its grid with the fit window resolved.
#[derive(Debug, Clone)]
pub struct PreparedProfile {
    /// Samples truncated to the grid length.
    pub profile: Profile,
    pub phantom: PhantomKind,
    pub grid: Vec<f64>,
    pub window: FitWindow,
    pub selection: WindowSelection,
}

/// All computed outputs of a single `falloff fit` run on one profile.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub prepared: PreparedProfile,
    pub fit: FitResult,
    /// Fitted curve on a dense grid over the window.
    pub curve: SeriesGrid,
}

impl RunOutput {
    pub fn range(&self) -> RangeEstimate {
        self.fit.range_estimate()
    }

    /// Fitted values at each grid position.
    pub fn fitted_on_grid(&self) -> Vec<f64> {
        predict_all(self.fit.model, &self.prepared.grid, &self.fit.values())
    }
}

/// Read `path` and run the full pipeline on it.
pub fn run_profile(path: &Path, config: &FitConfig) -> Result<RunOutput, AppError> {
    let profile = read_profile(path)?;
    run_loaded(profile, config)
}

/// Run the pipeline on an already loaded profile.
///
/// This is useful for the TUI where we refit without re-reading the file.
pub fn run_loaded(profile: Profile, config: &FitConfig) -> Result<RunOutput, AppError> {
    let prepared = prepare(profile, config)?;
    fit_prepared(prepared, config)
}

/// Detect the phantom, build the grid and resolve the window.
pub fn prepare(mut profile: Profile, config: &FitConfig) -> Result<PreparedProfile, AppError> {
    let grid_spec = config.grid;
    if !(grid_spec.step.is_finite() && grid_spec.step > 0.0) {
        return Err(AppError::new(2, format!("Invalid bin step {}: must be positive.", grid_spec.step)));
    }
    if !grid_spec.shift.is_finite() {
        return Err(AppError::new(2, "Invalid grid shift: must be finite."));
    }

    let phantom = match config.phantom.to_kind() {
        Some(kind) => kind,
        None => detect_phantom(&profile.samples)?,
    };
    let bins = grid_spec.bins.unwrap_or_else(|| phantom.default_bins());
    if bins == 0 {
        return Err(AppError::new(2, "Bin count must be at least 1."));
    }

    let n = profile.samples.len();
    if n < bins {
        return Err(AppError::new(
            3,
            format!(
                "Profile '{}' has {n} samples but the {} grid needs {bins}.",
                profile.source.display(),
                phantom.display_name()
            ),
        ));
    }
    if n > bins {
        log::warn!(
            "{}: {n} samples, using the first {bins} ({} grid)",
            profile.source.display(),
            phantom.display_name()
        );
        profile.samples.truncate(bins);
    }

    let grid = gen_lin(bins, grid_spec.shift, grid_spec.step);
    let window = match config.window {
        Some((start, stop)) => explicit_window(start, stop)?,
        None => default_window(phantom, &grid, &profile.samples)?,
    };
    let selection = select_window(&grid, &profile.samples, &window, grid_spec.step, config.positions)?;

    log::info!(
        "{}: {}, window [{:.3}, {:.3}] with {} samples",
        profile.source.display(),
        phantom.display_name(),
        window.start,
        window.stop,
        selection.samples.len()
    );

    Ok(PreparedProfile {
        profile,
        phantom,
        grid,
        window,
        selection,
    })
}

/// Fit the configured model on a prepared window.
pub fn fit_prepared(prepared: PreparedProfile, config: &FitConfig) -> Result<RunOutput, AppError> {
    let opts = FitOptions::from_config(config.model, config)?;
    let fit = fit_model(
        config.model,
        &prepared.selection.positions,
        &prepared.selection.samples,
        &opts,
    )?;

    let position = linspace(prepared.window.start, prepared.window.stop, config.curve_points);
    let intensity = predict_all(fit.model, &position, &fit.values());

    let range = fit.range_estimate();
    log::info!(
        "{}: {} z={:.4} chisqr={:.6e}",
        prepared.profile.source.display(),
        fit.model.display_name(),
        range.z,
        range.chisqr
    );

    Ok(RunOutput {
        prepared,
        fit,
        curve: SeriesGrid { position, intensity },
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::{GridSpec, PhantomSpec, PositionMode};

    fn cube(n: usize) -> Profile {
        let samples = gen_lin(n, 1.25, 2.5)
            .iter()
            .map(|&x| 0.95 / (1.0 + ((x - 99.5) / 4.0).exp()) + 0.03)
            .collect();
        Profile {
            source: PathBuf::from("cube.txt"),
            samples,
        }
    }

    #[test]
    fn short_profile_is_rejected() {
        let err = prepare(cube(40), &FitConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("needs 60"));
    }

    #[test]
    fn long_profile_is_truncated() {
        let prepared = prepare(cube(75), &FitConfig::default()).unwrap();
        assert_eq!(prepared.profile.samples.len(), 60);
        assert_eq!(prepared.grid.len(), 60);
        assert_eq!(prepared.phantom, PhantomKind::Cube);
    }

    #[test]
    fn phantom_override_skips_detection() {
        let config = FitConfig {
            phantom: PhantomSpec::PencilBeam,
            ..FitConfig::default()
        };
        let prepared = prepare(cube(60), &config).unwrap();
        assert_eq!(prepared.phantom, PhantomKind::PencilBeam);
        assert_eq!(prepared.grid.len(), 50);
        // peak of a falling profile is the first bin
        assert_eq!(prepared.window.start, 1.25);
    }

    #[test]
    fn cube_fit_reports_the_falloff() {
        let out = run_loaded(cube(60), &FitConfig::default()).unwrap();
        let range = out.range();
        // explicit positions sit 0.5 mm below the bin centres
        assert!((range.z - 99.0).abs() < 0.05, "z={}", range.z);
        assert_eq!(out.curve.position.len(), 10_000);
        assert_eq!(out.fitted_on_grid().len(), 60);

        let grid_config = FitConfig {
            positions: PositionMode::Grid,
            ..FitConfig::default()
        };
        let out = run_loaded(cube(60), &grid_config).unwrap();
        assert!((out.range().z - 99.5).abs() < 0.05, "z={}", out.range().z);
    }

    #[test]
    fn invalid_grid_is_a_config_error() {
        let config = FitConfig {
            grid: GridSpec {
                step: 0.0,
                ..GridSpec::default()
            },
            ..FitConfig::default()
        };
        assert_eq!(prepare(cube(60), &config).unwrap_err().exit_code(), 2);
    }
}
