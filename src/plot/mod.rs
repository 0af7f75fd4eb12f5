//! Plot rendering for profiles and fits.
//!
//! Both renderers draw the same three layers from a [`PlotData`]:
//! - the raw profile as a step line centred on each bin
//! - the fitted curve over the window
//! - a vertical marker at the fitted `z`

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;

use crate::app::pipeline::RunOutput;
use crate::domain::ResultFile;

pub const X_LABEL: &str = "range (mm)";
pub const Y_LABEL: &str = "activity (a.u.)";

/// Lower bound of the default intensity axis.
const Y_FLOOR: f64 = 0.0;
/// Upper bound of the default intensity axis (normalized profiles peak at 1).
const Y_CEIL: f64 = 1.1;

/// Everything a renderer needs, independent of where it came from.
#[derive(Debug, Clone)]
pub struct PlotData {
    pub title: String,
    /// Raw profile `(position, intensity)`.
    pub data: Vec<(f64, f64)>,
    /// Fitted curve; may be empty.
    pub curve: Vec<(f64, f64)>,
    pub z: Option<f64>,
}

impl PlotData {
    pub fn from_run(run: &RunOutput) -> Self {
        let prepared = &run.prepared;
        Self {
            title: format!(
                "{} | {}",
                prepared.profile.source.display(),
                run.fit.model.display_name()
            ),
            data: prepared
                .grid
                .iter()
                .copied()
                .zip(prepared.profile.samples.iter().copied())
                .collect(),
            curve: run.curve.points(),
            z: Some(run.range().z).filter(|z| z.is_finite()),
        }
    }

    pub fn from_result(result: &ResultFile) -> Self {
        Self {
            title: format!("{} | {}", result.source.display(), result.fit.model.display_name()),
            data: result.profile.points(),
            curve: result.curve.points(),
            z: Some(result.range.z).filter(|z| z.is_finite()),
        }
    }

    /// X bounds of the raw profile.
    pub fn x_bounds(&self) -> Option<(f64, f64)> {
        finite_bounds(self.data.iter().map(|&(x, _)| x))
    }

    /// Y bounds: `[0, 1.1]`, widened when the data or the curve leave it.
    pub fn y_bounds(&self) -> (f64, f64) {
        let ys = self.data.iter().chain(self.curve.iter()).map(|&(_, y)| y);
        match finite_bounds(ys) {
            Some((lo, hi)) => (lo.min(Y_FLOOR), (hi * 1.05).max(Y_CEIL)),
            None => (Y_FLOOR, Y_CEIL),
        }
    }

    /// Horizontal step segments `(left, right, y)`, one per sample.
    ///
    /// Each sample spans from the midpoint with its left neighbour to the
    /// midpoint with its right neighbour; the outer samples stop at their own
    /// position.
    pub fn step_segments(&self) -> Vec<(f64, f64, f64)> {
        let n = self.data.len();
        (0..n)
            .map(|i| {
                let (x, y) = self.data[i];
                let left = if i > 0 { 0.5 * (self.data[i - 1].0 + x) } else { x };
                let right = if i + 1 < n { 0.5 * (x + self.data[i + 1].0) } else { x };
                (left, right, y)
            })
            .collect()
    }
}

fn finite_bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    (lo.is_finite() && hi.is_finite() && hi > lo).then_some((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plot(data: Vec<(f64, f64)>) -> PlotData {
        PlotData {
            title: String::new(),
            data,
            curve: vec![],
            z: None,
        }
    }

    #[test]
    fn y_bounds_default_to_unit_range() {
        assert_eq!(plot(vec![(0.0, 0.2), (1.0, 0.9)]).y_bounds(), (0.0, 1.1));
        let (lo, hi) = plot(vec![(0.0, -0.1), (1.0, 2.0)]).y_bounds();
        assert_eq!(lo, -0.1);
        assert!((hi - 2.1).abs() < 1e-12);
    }

    #[test]
    fn steps_meet_at_midpoints() {
        let segs = plot(vec![(0.0, 1.0), (2.0, 0.5), (4.0, 0.0)]).step_segments();
        assert_eq!(segs, vec![(0.0, 1.0, 1.0), (1.0, 3.0, 0.5), (3.0, 4.0, 0.0)]);
    }
}
