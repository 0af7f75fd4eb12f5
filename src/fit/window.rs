//! Phantom detection and fit-window selection.
//!
//! The profile type is inferred from where the maximum sample sits:
//! - index `> 20`: pencil beam in PMMA (build-up, then a Bragg-like peak)
//! - index `< 10`: water cube (plateau from the entrance, falloff later)
//! - anything in between is rejected
//!
//! Default windows:
//! - pencil beam: `[peak, peak + 18]`
//! - cube: `[falloff - 28, falloff + 30]`, where `falloff` is located by
//!   [`find_min`]

use crate::domain::{FitWindow, PhantomKind, PositionMode, WindowSource};
use crate::error::AppError;
use crate::math::{argmax, argmin, gradient};

/// Peak index above which a profile is a pencil beam.
pub const PENCIL_BEAM_PEAK_INDEX: usize = 20;
/// Peak index below which a profile is a cube phantom.
pub const CUBE_PEAK_INDEX: usize = 10;
/// The falloff search ignores positions below this (mm).
pub const FALLOFF_SEARCH_FROM: f64 = 20.0;
/// Pencil-beam window length after the peak (mm).
pub const PENCIL_BEAM_SPAN: f64 = 18.0;
/// Cube window extent before the falloff (mm).
pub const CUBE_SPAN_BEFORE: f64 = 28.0;
/// Cube window extent after the falloff (mm).
pub const CUBE_SPAN_AFTER: f64 = 30.0;

/// Slack for comparing grid positions against window bounds.
const BOUND_EPS: f64 = 1e-9;

/// Infer the phantom kind from the index of the first maximum.
pub fn detect_phantom(data: &[f64]) -> Result<PhantomKind, AppError> {
    let Some(peak) = argmax(data) else {
        return Err(AppError::new(3, "Cannot detect phantom type: profile has no finite samples."));
    };
    if peak > PENCIL_BEAM_PEAK_INDEX {
        Ok(PhantomKind::PencilBeam)
    } else if peak < CUBE_PEAK_INDEX {
        Ok(PhantomKind::Cube)
    } else {
        Err(AppError::new(
            3,
            format!(
                "Cannot detect phantom type: maximum at sample {peak} is neither before {CUBE_PEAK_INDEX} \
                 (cube) nor after {PENCIL_BEAM_PEAK_INDEX} (pencil beam). Pass --phantom explicitly."
            ),
        ))
    }
}

/// Locate the falloff: the position one sample before the steepest descent.
///
/// Only positions `>= 20` are searched. Ties resolve to the first minimum of
/// the gradient; a shift below the first searched sample clamps to it.
pub fn find_min(xs: &[f64], data: &[f64]) -> Result<f64, AppError> {
    let (short_range, values): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(data.iter())
        .filter(|(x, _)| **x >= FALLOFF_SEARCH_FROM)
        .map(|(&x, &y)| (x, y))
        .unzip();

    if short_range.len() < 2 {
        return Err(AppError::new(
            3,
            format!(
                "Falloff search needs at least 2 samples at positions >= {FALLOFF_SEARCH_FROM}, found {}.",
                short_range.len()
            ),
        ));
    }

    let diff = gradient(&values, &short_range)?;
    let Some(min_idx) = argmin(&diff) else {
        return Err(AppError::new(3, "Falloff search found no finite gradient."));
    };

    let idx = min_idx.saturating_sub(1);
    log::debug!(
        "steepest descent at {:.3} (gradient {:.4e}), falloff reported at {:.3}",
        short_range[min_idx],
        diff[min_idx],
        short_range[idx]
    );
    Ok(short_range[idx])
}

/// Default window for the given phantom kind.
pub fn default_window(kind: PhantomKind, grid: &[f64], data: &[f64]) -> Result<FitWindow, AppError> {
    match kind {
        PhantomKind::PencilBeam => {
            let n = grid.len().min(data.len());
            let Some(peak_idx) = argmax(&data[..n]) else {
                return Err(AppError::new(3, "Cannot place window: profile has no finite samples."));
            };
            let peak = grid[peak_idx];
            Ok(FitWindow {
                start: peak,
                stop: peak + PENCIL_BEAM_SPAN,
                source: WindowSource::PeakOffset { peak },
            })
        }
        PhantomKind::Cube => {
            let falloff = find_min(grid, data)?;
            Ok(FitWindow {
                start: falloff - CUBE_SPAN_BEFORE,
                stop: falloff + CUBE_SPAN_AFTER,
                source: WindowSource::FalloffOffset { falloff },
            })
        }
    }
}

/// Validate a user-supplied window.
pub fn explicit_window(start: f64, stop: f64) -> Result<FitWindow, AppError> {
    if !(start.is_finite() && stop.is_finite()) || stop <= start {
        return Err(AppError::new(
            2,
            format!("Invalid window [{start}, {stop}]: bounds must be finite with start < stop."),
        ));
    }
    Ok(FitWindow {
        start,
        stop,
        source: WindowSource::Explicit,
    })
}

/// Explicit position sequence `start + i·step`, `i in 0..=⌊(stop - start)/step⌋`.
pub fn window_positions(window: &FitWindow, step: f64) -> Vec<f64> {
    let count = ((window.stop - window.start) / step + BOUND_EPS).floor();
    if !(count.is_finite() && count >= 0.0) {
        return Vec::new();
    }
    (0..=count as usize)
        .map(|i| window.start + i as f64 * step)
        .collect()
}

/// Samples selected by a window, paired with the x-values used for fitting.
#[derive(Debug, Clone)]
pub struct WindowSelection {
    /// Indices into the grid/profile.
    pub indices: Vec<usize>,
    pub positions: Vec<f64>,
    pub samples: Vec<f64>,
}

/// Select the window samples and their fit positions.
pub fn select_window(
    grid: &[f64],
    data: &[f64],
    window: &FitWindow,
    step: f64,
    mode: PositionMode,
) -> Result<WindowSelection, AppError> {
    let indices: Vec<usize> = grid
        .iter()
        .take(data.len())
        .enumerate()
        .filter(|(_, x)| **x >= window.start - BOUND_EPS && **x <= window.stop + BOUND_EPS)
        .map(|(i, _)| i)
        .collect();

    if indices.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "Window [{:.3}, {:.3}] contains no samples of the grid [{:.3}, {:.3}].",
                window.start,
                window.stop,
                grid.first().copied().unwrap_or(f64::NAN),
                grid.last().copied().unwrap_or(f64::NAN),
            ),
        ));
    }

    let samples: Vec<f64> = indices.iter().map(|&i| data[i]).collect();
    let positions = match mode {
        PositionMode::Grid => indices.iter().map(|&i| grid[i]).collect(),
        PositionMode::Explicit => {
            let positions = window_positions(window, step);
            if positions.len() != samples.len() {
                return Err(AppError::new(
                    3,
                    format!(
                        "Window [{:.3}, {:.3}] spans {} explicit positions but {} grid samples; \
                         align the bounds to the bin step or use --positions grid.",
                        window.start,
                        window.stop,
                        positions.len(),
                        samples.len()
                    ),
                ));
            }
            positions
        }
    };

    Ok(WindowSelection {
        indices,
        positions,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::gen_lin;

    fn cube_profile() -> (Vec<f64>, Vec<f64>) {
        let grid = gen_lin(60, 1.25, 2.5);
        let data = grid
            .iter()
            .map(|&x| 1.0 - 0.001 * x - 0.9 / (1.0 + (-(x - 99.5) / 3.0).exp()))
            .collect();
        (grid, data)
    }

    fn pencil_profile() -> (Vec<f64>, Vec<f64>) {
        let grid = gen_lin(50, 1.25, 2.5);
        let data = grid
            .iter()
            .map(|&x| {
                let build_up = 0.3 + 0.7 * (x / 88.75).min(1.0);
                build_up / (1.0 + (x - 93.0).exp())
            })
            .collect();
        (grid, data)
    }

    #[test]
    fn detects_phantom_by_peak_index() {
        let (_, cube) = cube_profile();
        assert_eq!(detect_phantom(&cube).unwrap(), PhantomKind::Cube);

        let (_, pencil) = pencil_profile();
        assert_eq!(detect_phantom(&pencil).unwrap(), PhantomKind::PencilBeam);

        let mut middle = vec![0.1; 40];
        middle[15] = 1.0;
        assert_eq!(detect_phantom(&middle).unwrap_err().exit_code(), 3);

        // boundaries: 10 and 20 are both undetectable
        middle[15] = 0.1;
        middle[10] = 1.0;
        assert!(detect_phantom(&middle).is_err());
        middle[10] = 0.1;
        middle[20] = 1.0;
        assert!(detect_phantom(&middle).is_err());
        middle[20] = 0.1;
        middle[21] = 1.0;
        assert_eq!(detect_phantom(&middle).unwrap(), PhantomKind::PencilBeam);
    }

    #[test]
    fn find_min_reports_sample_before_steepest_descent() {
        let xs = gen_lin(10, 1.25, 10.0);
        // positions: 1.25, 11.25, 21.25, ... ; steepest drop between 51.25 and 61.25
        let data = [1.0, 1.0, 1.0, 1.0, 0.95, 0.9, 0.2, 0.1, 0.05, 0.0];
        let m = find_min(&xs, &data).unwrap();
        // steepest central difference at 61.25, reported one sample earlier
        assert!((m - 51.25).abs() < 1e-12, "m={m}");
    }

    #[test]
    fn find_min_clamps_at_start_of_search() {
        let xs = [25.0, 27.5, 30.0];
        let data = [1.0, 0.0, 0.0];
        assert_eq!(find_min(&xs, &data).unwrap(), 25.0);

        let err = find_min(&[1.0, 2.0, 25.0], &[1.0, 0.5, 0.0]).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn cube_window_brackets_the_falloff() {
        let (grid, data) = cube_profile();
        let w = default_window(PhantomKind::Cube, &grid, &data).unwrap();
        let WindowSource::FalloffOffset { falloff } = w.source else {
            panic!("unexpected source {:?}", w.source);
        };
        assert!((falloff - 96.25).abs() < 1e-9, "falloff={falloff}");
        assert!((w.start - (falloff - 28.0)).abs() < 1e-12);
        assert!((w.stop - (falloff + 30.0)).abs() < 1e-12);

        let sel = select_window(&grid, &data, &w, 2.5, PositionMode::Explicit).unwrap();
        assert_eq!(sel.samples.len(), 24);
        assert_eq!(sel.positions.len(), 24);
        // explicit positions run from the off-grid start
        assert!((sel.positions[0] - w.start).abs() < 1e-12);
        assert!((grid[sel.indices[0]] - sel.positions[0] - 0.5).abs() < 1e-9);

        let sel = select_window(&grid, &data, &w, 2.5, PositionMode::Grid).unwrap();
        assert_eq!(sel.positions[0], grid[sel.indices[0]]);
    }

    #[test]
    fn pencil_window_starts_at_peak() {
        let (grid, data) = pencil_profile();
        let w = default_window(PhantomKind::PencilBeam, &grid, &data).unwrap();
        assert_eq!(w.start, 88.75);
        assert_eq!(w.stop, 88.75 + 18.0);

        let sel = select_window(&grid, &data, &w, 2.5, PositionMode::Explicit).unwrap();
        assert_eq!(sel.samples.len(), 8);
        assert_eq!(sel.positions, grid[sel.indices[0]..=sel.indices[7]].to_vec());
    }

    #[test]
    fn explicit_sequence_includes_stop_bin() {
        let w = explicit_window(80.0, 100.0).unwrap();
        let pos = window_positions(&w, 2.5);
        assert_eq!(pos.len(), 9);
        assert_eq!(pos[8], 100.0);

        assert!(explicit_window(100.0, 80.0).is_err());
        assert!(explicit_window(f64::NAN, 80.0).is_err());
    }

    #[test]
    fn misaligned_explicit_window_is_reported() {
        let grid = gen_lin(60, 1.25, 2.5);
        let data = vec![0.5; 60];
        let w = explicit_window(80.0, 100.0).unwrap();
        let err = select_window(&grid, &data, &w, 2.5, PositionMode::Explicit).unwrap_err();
        assert!(err.to_string().contains("--positions grid"));
        let sel = select_window(&grid, &data, &w, 2.5, PositionMode::Grid).unwrap();
        assert_eq!(sel.samples.len(), 8);
    }
}
