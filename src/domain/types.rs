//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Default position of the first bin centre (mm).
pub const DEFAULT_SHIFT: f64 = 1.25;

/// Default bin width (mm).
pub const DEFAULT_STEP: f64 = 2.5;

/// Number of points in the dense fitted-curve grid.
pub const DEFAULT_CURVE_POINTS: usize = 10_000;

/// Curve family used to model the profile falloff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// `a / (1 + exp((x - z)/c)) + d`
    Sigmoid,
    /// `a + (b - a) / (1 + 10^((z - x)·d))`
    DoseResponse,
    /// `a + (b - a)·x^d / (z^d + x^d)`
    Hill,
    /// `b + (a - b) / (1 + (x/z)^d)`
    LogDoseResponse,
    /// `a + (b - a) / (1 + (z/x)^d)^e`
    Logistic5,
    /// `-atan(x/a - z) + c`
    Arctan,
    /// `-tanh(x/a - z) + c`
    Tanh,
}

impl ModelKind {
    pub const ALL: [ModelKind; 7] = [
        ModelKind::Sigmoid,
        ModelKind::DoseResponse,
        ModelKind::Hill,
        ModelKind::LogDoseResponse,
        ModelKind::Logistic5,
        ModelKind::Arctan,
        ModelKind::Tanh,
    ];

    /// Models that take part in `compare` by default.
    ///
    /// The trigonometric variants are fit-only: their `z` is a dimensionless
    /// offset, not a position, so ranking them against the others is meaningless.
    pub const COMPARABLE: [ModelKind; 5] = [
        ModelKind::Sigmoid,
        ModelKind::DoseResponse,
        ModelKind::Hill,
        ModelKind::LogDoseResponse,
        ModelKind::Logistic5,
    ];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Sigmoid => "sigmoid",
            ModelKind::DoseResponse => "dose-response",
            ModelKind::Hill => "Hill",
            ModelKind::LogDoseResponse => "log dose-response",
            ModelKind::Logistic5 => "5-param logistic",
            ModelKind::Arctan => "arctan",
            ModelKind::Tanh => "tanh",
        }
    }

    /// Parameter names in evaluation order (`x` excluded).
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Sigmoid => &["a", "z", "c", "d"],
            ModelKind::DoseResponse | ModelKind::Hill | ModelKind::LogDoseResponse => {
                &["a", "b", "z", "d"]
            }
            ModelKind::Logistic5 => &["a", "b", "z", "d", "e"],
            ModelKind::Arctan | ModelKind::Tanh => &["a", "z", "c"],
        }
    }

    pub fn param_count(self) -> usize {
        self.param_names().len()
    }

    /// Index of the range parameter `z`.
    pub fn z_index(self) -> usize {
        self.param_names()
            .iter()
            .position(|&n| n == "z")
            .unwrap_or(0)
    }

    /// NaN handling used when the caller does not override it.
    ///
    /// The Hill function overflows for steep exponents on some pencil-beam
    /// windows, so it keeps going instead of failing.
    pub fn default_nan_policy(self) -> NanPolicy {
        match self {
            ModelKind::Hill => NanPolicy::Propagate,
            _ => NanPolicy::Raise,
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|&m| m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|&m| m == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Phantom geometry, inferred from where the profile peaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PhantomKind {
    /// PMMA pencil-beam profile: the maximum sits late in the sequence.
    PencilBeam,
    /// Water cube phantom: the maximum sits at the start.
    Cube,
}

impl PhantomKind {
    pub fn display_name(self) -> &'static str {
        match self {
            PhantomKind::PencilBeam => "pencil beam (PMMA)",
            PhantomKind::Cube => "cube (water)",
        }
    }

    /// Number of position bins recorded for this geometry.
    pub fn default_bins(self) -> usize {
        match self {
            PhantomKind::PencilBeam => 50,
            PhantomKind::Cube => 60,
        }
    }
}

/// CLI choice for the phantom geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PhantomSpec {
    Auto,
    PencilBeam,
    Cube,
}

impl PhantomSpec {
    pub fn to_kind(self) -> Option<PhantomKind> {
        match self {
            PhantomSpec::Auto => None,
            PhantomSpec::PencilBeam => Some(PhantomKind::PencilBeam),
            PhantomSpec::Cube => Some(PhantomKind::Cube),
        }
    }
}

/// How non-finite data and model values are treated during a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NanPolicy {
    /// Fail on non-finite data, or as soon as the model turns non-finite.
    Raise,
    /// Fail on non-finite data; trial steps where the model turns non-finite are rejected.
    Propagate,
    /// Drop non-finite data points before fitting.
    Omit,
}

/// Which x-values are paired with the window samples during a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PositionMode {
    /// `start + i·step` counted from the window start, even when the start is
    /// off-grid (the cube window start sits 0.5 mm below a bin centre).
    Explicit,
    /// The grid positions of the selected bins.
    Grid,
}

/// Layout of the synthetic position grid (`shift + i·step`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub shift: f64,
    pub step: f64,
    /// Bin count override; `None` uses the phantom default.
    pub bins: Option<usize>,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            shift: DEFAULT_SHIFT,
            step: DEFAULT_STEP,
            bins: None,
        }
    }
}

/// Where the fit window came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WindowSource {
    /// Supplied by the user.
    Explicit,
    /// Pencil beam: starts at the peak.
    PeakOffset { peak: f64 },
    /// Cube: centred on the steepest descent.
    FalloffOffset { falloff: f64 },
}

/// Fit window in position units (inclusive on both ends).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitWindow {
    pub start: f64,
    pub stop: f64,
    pub source: WindowSource,
}

/// A loaded intensity profile.
#[derive(Debug, Clone)]
pub struct Profile {
    pub source: PathBuf,
    pub samples: Vec<f64>,
}

/// Fitted value of a single model parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamEstimate {
    pub name: String,
    pub value: f64,
    /// Standard error; `None` when the covariance could not be estimated.
    pub stderr: Option<f64>,
    pub init: f64,
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    /// Relative reduction of the cost fell below `ftol`.
    CostConverged,
    /// Relative step size fell below `xtol`.
    StepConverged,
    /// Gradient vanished.
    GradientConverged,
    /// Damping grew without finding a better point.
    NoProgress,
    /// Evaluation budget exhausted.
    MaxEvaluations,
}

impl Termination {
    pub fn converged(self) -> bool {
        matches!(
            self,
            Termination::CostConverged | Termination::StepConverged | Termination::GradientConverged
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            Termination::CostConverged => "relative reduction in chi-square below ftol",
            Termination::StepConverged => "relative step size below xtol",
            Termination::GradientConverged => "gradient vanished",
            Termination::NoProgress => "no further reduction possible",
            Termination::MaxEvaluations => "evaluation budget exhausted",
        }
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub ndata: usize,
    pub nvarys: usize,
    pub chisqr: f64,
    pub redchi: f64,
    pub aic: f64,
    pub bic: f64,
    pub nfev: usize,
    pub termination: Termination,
}

/// Fit output for a single model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub model: ModelKind,
    pub params: Vec<ParamEstimate>,
    pub quality: FitQuality,
}

impl FitResult {
    pub fn param(&self, name: &str) -> Option<&ParamEstimate> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Parameter values in evaluation order.
    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    /// The three headline scalars: `z`, its standard error and chi-square.
    pub fn range_estimate(&self) -> RangeEstimate {
        let z = self.params.get(self.model.z_index());
        RangeEstimate {
            z: z.map_or(f64::NAN, |p| p.value),
            z_stderr: z.and_then(|p| p.stderr),
            chisqr: self.quality.chisqr,
        }
    }
}

/// Range parameter with its uncertainty and the fit's chi-square.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeEstimate {
    pub z: f64,
    pub z_stderr: Option<f64>,
    pub chisqr: f64,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub model: ModelKind,
    pub phantom: PhantomSpec,
    /// Explicit `(start, stop)` window; `None` selects the default heuristic.
    pub window: Option<(f64, f64)>,
    pub grid: GridSpec,
    pub positions: PositionMode,
    /// Initial-value overrides by parameter name.
    pub initial: Vec<(String, f64)>,
    /// `None` uses the model default.
    pub nan_policy: Option<NanPolicy>,
    /// `None` uses `2000·(nvarys + 1)`.
    pub max_nfev: Option<usize>,
    pub curve_points: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Sigmoid,
            phantom: PhantomSpec::Auto,
            window: None,
            grid: GridSpec::default(),
            positions: PositionMode::Explicit,
            initial: Vec::new(),
            nan_policy: None,
            max_nfev: None,
            curve_points: DEFAULT_CURVE_POINTS,
        }
    }
}

/// Position/intensity pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesGrid {
    pub position: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl SeriesGrid {
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.position
            .iter()
            .copied()
            .zip(self.intensity.iter().copied())
            .collect()
    }
}

/// A saved fit (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub source: PathBuf,
    pub phantom: PhantomKind,
    pub window: FitWindow,
    pub fit: FitResult,
    pub range: RangeEstimate,
    pub profile: SeriesGrid,
    pub curve: SeriesGrid,
}
