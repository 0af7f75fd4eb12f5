//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - runs the fit pipeline on each profile
//! - prints reports/plots
//! - writes optional exports

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use rayon::prelude::*;

use crate::cli::{Command, CompareArgs, FitArgs, PlotArgs, SimulateArgs, TuiArgs};
use crate::data::{SynthSpec, simulate, write_profile};
use crate::domain::{GridSpec, ModelKind};
use crate::error::AppError;
use crate::plot::{PlotData, SVG_SIZE, render_ascii_plot, write_svg};

pub mod pipeline;

/// Entry point for the `falloff` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `falloff` alone opens the TUI and `falloff profile.txt` means `falloff fit profile.txt`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    init_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Compare(args) => handle_compare(args),
        Command::Plot(args) => handle_plot(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Tui(args) => handle_tui(args),
    }
}

/// `warn` by default, raised by each `-v`; `RUST_LOG` wins when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = args.window.to_config(args.model);
    for dir in [&args.svg_dir, &args.export_dir].into_iter().flatten() {
        fs::create_dir_all(dir)
            .map_err(|e| AppError::new(2, format!("Failed to create directory '{}': {e}", dir.display())))?;
    }

    // Fit in parallel, report in input order.
    let runs: Vec<_> = args
        .profiles
        .par_iter()
        .map(|path| pipeline::run_profile(path, &config))
        .collect();

    let total = runs.len();
    let mut first_error: Option<AppError> = None;
    for (path, run) in args.profiles.iter().zip(runs) {
        let run = match run {
            Ok(run) => run,
            Err(err) => {
                if let Some(line) = failure_line(path, &err, total) {
                    eprintln!("{line}");
                }
                if first_error.is_none() {
                    first_error = Some(err);
                }
                continue;
            }
        };

        println!("{}", crate::report::format_run_summary(&run));

        let plot = PlotData::from_run(&run);
        if !args.no_plot {
            println!("{}", render_ascii_plot(&plot, args.width, args.height));
        }
        if let Some(dir) = &args.svg_dir {
            write_svg(&output_path(dir, path, "svg"), &plot, SVG_SIZE)?;
        }
        if let Some(dir) = &args.export_dir {
            crate::io::write_results_csv(&output_path(dir, path, "csv"), &run)?;
            crate::io::write_result_json(&output_path(dir, path, "json"), &run)?;
        }
    }

    match first_error {
        Some(err) if total > 1 => Err(AppError::new(
            err.exit_code(),
            format!("Failed to fit one or more of {total} profiles (first error: {err})"),
        )),
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn handle_compare(args: CompareArgs) -> Result<(), AppError> {
    let models: Vec<ModelKind> = if args.models.is_empty() {
        ModelKind::COMPARABLE.to_vec()
    } else {
        args.models.clone()
    };
    let config = args.window.to_config(models[0]);

    let profile = crate::io::read_profile(&args.profile)?;
    let prepared = pipeline::prepare(profile, &config)?;
    let comparison = crate::fit::compare_models(
        &models,
        &prepared.selection.positions,
        &prepared.selection.samples,
        &config,
    )?;

    println!("{}", crate::report::format_comparison(&prepared, &comparison));
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let result = crate::io::read_result_json(&args.result)?;
    let plot = PlotData::from_result(&result);

    println!("{}", render_ascii_plot(&plot, args.width, args.height));
    println!("{}", crate::report::format_range(&result.range));

    if let Some(path) = &args.svg {
        write_svg(path, &plot, SVG_SIZE)?;
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let defaults = SynthSpec::for_phantom(args.phantom);
    let spec = SynthSpec {
        phantom: args.phantom,
        z: args.z.unwrap_or(defaults.z),
        width: args.width.unwrap_or(defaults.width),
        noise: args.noise,
        seed: args.seed,
        grid: GridSpec {
            bins: args.bins,
            ..GridSpec::default()
        },
    };

    let samples = simulate(&spec)?;
    write_profile(&args.output, &samples)?;
    println!(
        "Wrote {} {} samples (z={} mm) to {}",
        samples.len(),
        spec.phantom.display_name(),
        spec.z,
        args.output.display()
    );
    Ok(())
}

fn handle_tui(args: TuiArgs) -> Result<(), AppError> {
    let path = match &args.profile {
        Some(path) => crate::cli::picker::validate_profile_path(path)?,
        None => crate::cli::picker::prompt_for_profile_path()?,
    };
    let config = args.window.to_config(args.model);
    crate::tui::run(&path, config)
}

/// Per-profile failure line for batch runs; a lone profile's error is printed by `main`.
fn failure_line(path: &Path, err: &AppError, total: usize) -> Option<String> {
    (total > 1).then(|| format!("{}: {err}", path.display()))
}

/// `<dir>/<profile stem>.<ext>`
fn output_path(dir: &Path, profile: &Path, ext: &str) -> PathBuf {
    let stem = profile
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "profile".to_string());
    dir.join(format!("{stem}.{ext}"))
}

/// Rewrite argv so bare invocations map onto subcommands.
///
/// Rules:
/// - `falloff`                       -> `falloff tui`
/// - `falloff -m hill ...`           -> `falloff tui -m hill ...`
/// - `falloff profile.txt ...`       -> `falloff fit profile.txt ...`
/// - `falloff --help/--version/-h`   -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "fit" | "compare" | "plot" | "simulate" | "tui");
    if is_subcommand {
        return argv;
    }

    // A leading flag means "tui flags"; anything else is a profile path.
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
    } else {
        argv.insert(1, "fit".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_opens_tui() {
        assert_eq!(rewrite_args(argv(&["falloff"])), argv(&["falloff", "tui"]));
        assert_eq!(
            rewrite_args(argv(&["falloff", "-m", "hill"])),
            argv(&["falloff", "tui", "-m", "hill"])
        );
    }

    #[test]
    fn bare_profile_means_fit() {
        assert_eq!(
            rewrite_args(argv(&["falloff", "beam.txt", "--no-plot"])),
            argv(&["falloff", "fit", "beam.txt", "--no-plot"])
        );
    }

    #[test]
    fn subcommands_and_help_are_untouched() {
        for args in [
            &["falloff", "compare", "a.txt"][..],
            &["falloff", "--help"][..],
            &["falloff", "-V"][..],
        ] {
            assert_eq!(rewrite_args(argv(args)), argv(args));
        }
    }

    #[test]
    fn single_profile_failures_are_printed_once() {
        let err = AppError::new(3, "Window contains no samples.");
        assert_eq!(failure_line(Path::new("a.txt"), &err, 1), None);
        assert_eq!(
            failure_line(Path::new("a.txt"), &err, 2).as_deref(),
            Some("a.txt: Window contains no samples.")
        );
    }

    #[test]
    fn outputs_are_named_after_the_profile() {
        let p = output_path(Path::new("out"), Path::new("data/beam_01.txt"), "svg");
        assert_eq!(p, PathBuf::from("out/beam_01.svg"));
    }
}
