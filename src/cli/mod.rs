//! Command-line parsing for the falloff range fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{
    DEFAULT_CURVE_POINTS, DEFAULT_SHIFT, DEFAULT_STEP, FitConfig, GridSpec, ModelKind, NanPolicy, PhantomKind,
    PhantomSpec, PositionMode,
};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "falloff", version, about = "Range falloff fitter for beam activity profiles")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one model to one or more profiles, print the range and optionally plot/export.
    Fit(FitArgs),
    /// Fit several models on the same window and rank them by BIC.
    Compare(CompareArgs),
    /// Plot a previously exported result JSON.
    Plot(PlotArgs),
    /// Write a synthetic profile.
    Simulate(SimulateArgs),
    /// Launch the interactive TUI.
    ///
    /// This uses the same underlying fit pipeline as `falloff fit`, but renders
    /// results in a terminal UI using Ratatui.
    Tui(TuiArgs),
}

/// Grid and window options shared by every fitting command.
#[derive(Debug, Args, Clone)]
pub struct WindowArgs {
    /// Phantom geometry; `auto` infers it from the position of the maximum.
    #[arg(long, value_enum, default_value_t = PhantomSpec::Auto)]
    pub phantom: PhantomSpec,

    /// Window start (mm). Requires `--stop`.
    #[arg(long, requires = "stop", allow_negative_numbers = true)]
    pub start: Option<f64>,

    /// Window stop (mm). Requires `--start`.
    #[arg(long, requires = "start", allow_negative_numbers = true)]
    pub stop: Option<f64>,

    /// Number of bins (default: 50 for a pencil beam, 60 for a cube).
    #[arg(long)]
    pub bins: Option<usize>,

    /// Position of the first bin centre (mm).
    #[arg(long, env = "FALLOFF_SHIFT", default_value_t = DEFAULT_SHIFT, allow_negative_numbers = true)]
    pub shift: f64,

    /// Bin width (mm).
    #[arg(long, env = "FALLOFF_STEP", default_value_t = DEFAULT_STEP)]
    pub step: f64,

    /// Fit positions: counted from the window start, or the bin centres.
    #[arg(long, value_enum, default_value_t = PositionMode::Explicit)]
    pub positions: PositionMode,

    /// Initial parameter value, e.g. `--param z=100` (repeatable).
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, f64)>,

    /// NaN handling (default: per model; `propagate` for Hill, else `raise`).
    #[arg(long, value_enum)]
    pub nan_policy: Option<NanPolicy>,

    /// Maximum number of model evaluations (default: 2000·(k+1)).
    #[arg(long)]
    pub max_nfev: Option<usize>,
}

impl WindowArgs {
    /// Resolve the fit configuration for `model`.
    pub fn to_config(&self, model: ModelKind) -> FitConfig {
        FitConfig {
            model,
            phantom: self.phantom,
            window: self.start.zip(self.stop),
            grid: GridSpec {
                shift: self.shift,
                step: self.step,
                bins: self.bins,
            },
            positions: self.positions,
            initial: self.params.clone(),
            nan_policy: self.nan_policy,
            max_nfev: self.max_nfev,
            curve_points: DEFAULT_CURVE_POINTS,
        }
    }
}

/// Options for `falloff fit`.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Profile text file(s).
    #[arg(value_name = "PROFILE", required = true)]
    pub profiles: Vec<PathBuf>,

    /// Model to fit.
    #[arg(short, long, value_enum, env = "FALLOFF_MODEL", default_value_t = ModelKind::Sigmoid)]
    pub model: ModelKind,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Write `<profile>.svg` plots into this directory.
    #[arg(long, value_name = "DIR")]
    pub svg_dir: Option<PathBuf>,

    /// Write `<profile>.csv` and `<profile>.json` results into this directory.
    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,
}

/// Options for `falloff compare`.
#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    /// Profile text file.
    #[arg(value_name = "PROFILE")]
    pub profile: PathBuf,

    /// Models to compare (default: sigmoid, dose-response, hill, log-dose-response, logistic5).
    #[arg(long, value_enum, value_delimiter = ',')]
    pub models: Vec<ModelKind>,

    #[command(flatten)]
    pub window: WindowArgs,
}

/// Options for plotting a saved result.
#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Result JSON file produced by `falloff fit --export-dir`.
    #[arg(long, value_name = "JSON")]
    pub result: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Also write an SVG plot.
    #[arg(long, value_name = "FILE")]
    pub svg: Option<PathBuf>,
}

/// Options for `falloff simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Phantom geometry to simulate.
    #[arg(long, value_enum)]
    pub phantom: PhantomKind,

    /// Output profile path.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Falloff position (mm); default depends on the phantom.
    #[arg(long)]
    pub z: Option<f64>,

    /// Falloff width (mm); default depends on the phantom.
    #[arg(long)]
    pub width: Option<f64>,

    /// Standard deviation of the Gaussian noise.
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Number of bins (default: phantom default).
    #[arg(long)]
    pub bins: Option<usize>,
}

/// Options for the interactive viewer.
#[derive(Debug, Args, Clone)]
pub struct TuiArgs {
    /// Profile to open; prompts when omitted.
    #[arg(value_name = "PROFILE")]
    pub profile: Option<PathBuf>,

    /// Initial model.
    #[arg(short, long, value_enum, env = "FALLOFF_MODEL", default_value_t = ModelKind::Sigmoid)]
    pub model: ModelKind,

    #[command(flatten)]
    pub window: WindowArgs,
}

/// Parse a `NAME=VALUE` initial-value override.
pub fn parse_param(raw: &str) -> Result<(String, f64), String> {
    let Some((name, value)) = raw.split_once('=') else {
        return Err(format!("expected NAME=VALUE, got '{raw}'"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{raw}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid value in '{raw}'"))?;
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_param_overrides() {
        assert_eq!(parse_param("z=101.5").unwrap(), ("z".to_string(), 101.5));
        assert_eq!(parse_param(" c = -3 ").unwrap(), ("c".to_string(), -3.0));
        assert!(parse_param("z").is_err());
        assert!(parse_param("=1").is_err());
        assert!(parse_param("z=abc").is_err());
    }

    #[test]
    fn fit_args_build_a_config() {
        let cli = Cli::try_parse_from([
            "falloff", "fit", "a.txt", "b.txt", "--model", "hill", "--start", "80", "--stop", "110", "--param",
            "z=95", "--bins", "55",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.profiles.len(), 2);
        let config = args.window.to_config(args.model);
        assert_eq!(config.model, ModelKind::Hill);
        assert_eq!(config.window, Some((80.0, 110.0)));
        assert_eq!(config.grid.bins, Some(55));
        assert_eq!(config.initial, vec![("z".to_string(), 95.0)]);
    }

    #[test]
    fn start_requires_stop() {
        let err = Cli::try_parse_from(["falloff", "fit", "a.txt", "--start", "80"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn compare_accepts_model_lists() {
        let cli = Cli::try_parse_from(["falloff", "-vv", "compare", "a.txt", "--models", "sigmoid,hill"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.models, vec![ModelKind::Sigmoid, ModelKind::Hill]);
    }
}
