//! End-to-end runs over synthetic profiles written to disk.

use std::fs;
use std::path::PathBuf;

use falloff_fit::app::pipeline::{prepare, run_profile};
use falloff_fit::data::{SynthSpec, simulate, write_profile};
use falloff_fit::domain::{FitConfig, ModelKind, PhantomKind, PositionMode};
use falloff_fit::fit::compare_models;
use falloff_fit::io::{read_profile, read_result_json, write_result_json};
use falloff_fit::plot::{PlotData, render_ascii_plot};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("falloff-it-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn synthetic(dir: &PathBuf, phantom: PhantomKind, noise: f64, seed: u64) -> PathBuf {
    let spec = SynthSpec {
        noise,
        seed,
        ..SynthSpec::for_phantom(phantom)
    };
    let name = match phantom {
        PhantomKind::PencilBeam => "pencil",
        PhantomKind::Cube => "cube",
    };
    let path = dir.join(format!("{name}-{seed}.txt"));
    write_profile(&path, &simulate(&spec).unwrap()).unwrap();
    path
}

#[test]
fn simulated_profile_reads_back() {
    let dir = scratch_dir("roundtrip");
    let path = synthetic(&dir, PhantomKind::Cube, 0.01, 3);
    let profile = read_profile(&path).unwrap();
    let _ = fs::remove_dir_all(&dir);

    assert_eq!(profile.samples.len(), 60);
    assert!(profile.samples.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn cube_range_is_recovered() {
    let dir = scratch_dir("cube");
    let path = synthetic(&dir, PhantomKind::Cube, 0.0, 0);
    let config = FitConfig {
        positions: PositionMode::Grid,
        ..FitConfig::default()
    };
    let run = run_profile(&path, &config).unwrap();
    let _ = fs::remove_dir_all(&dir);

    assert_eq!(run.prepared.phantom, PhantomKind::Cube);
    let window = &run.prepared.window;
    assert!((window.stop - window.start - 58.0).abs() < 1e-9);
    assert!(window.start < 100.0 && window.stop > 100.0);

    // the attenuating plateau pulls the logistic centre slightly upstream
    let range = run.range();
    assert!((range.z - 100.0).abs() < 1.0, "z={}", range.z);
    assert!(range.z_stderr.is_some());
}

#[test]
fn noisy_cube_stays_close() {
    let dir = scratch_dir("noisy");
    let path = synthetic(&dir, PhantomKind::Cube, 0.01, 7);
    let config = FitConfig {
        positions: PositionMode::Grid,
        ..FitConfig::default()
    };
    let run = run_profile(&path, &config).unwrap();
    let _ = fs::remove_dir_all(&dir);

    assert!((run.range().z - 100.0).abs() < 1.5, "z={}", run.range().z);
}

#[test]
fn pencil_beam_is_detected_and_fitted() {
    let dir = scratch_dir("pencil");
    let path = synthetic(&dir, PhantomKind::PencilBeam, 0.0, 0);
    let run = run_profile(&path, &FitConfig::default()).unwrap();
    let _ = fs::remove_dir_all(&dir);

    assert_eq!(run.prepared.phantom, PhantomKind::PencilBeam);
    assert_eq!(run.prepared.grid.len(), 50);
    assert!((run.range().z - 93.0).abs() < 0.5, "z={}", run.range().z);
}

#[test]
fn comparison_ranks_by_bic() {
    let dir = scratch_dir("compare");
    let path = synthetic(&dir, PhantomKind::Cube, 0.01, 1);
    let profile = read_profile(&path).unwrap();
    let _ = fs::remove_dir_all(&dir);

    let config = FitConfig {
        positions: PositionMode::Grid,
        ..FitConfig::default()
    };
    let prepared = prepare(profile, &config).unwrap();
    let comparison = compare_models(
        &ModelKind::COMPARABLE,
        &prepared.selection.positions,
        &prepared.selection.samples,
        &config,
    )
    .unwrap();

    assert_eq!(comparison.ranked.len() + comparison.failed.len(), ModelKind::COMPARABLE.len());
    assert!(comparison.best().is_some());
    for pair in comparison.ranked.windows(2) {
        assert!(pair[0].quality.bic <= pair[1].quality.bic);
    }
}

#[test]
fn exported_result_plots_again() {
    let dir = scratch_dir("result");
    let path = synthetic(&dir, PhantomKind::Cube, 0.0, 0);
    let run = run_profile(&path, &FitConfig::default()).unwrap();

    let json = dir.join("result.json");
    write_result_json(&json, &run).unwrap();
    let result = read_result_json(&json).unwrap();
    let _ = fs::remove_dir_all(&dir);

    assert_eq!(result.fit.model, ModelKind::Sigmoid);
    assert_eq!(result.profile.position.len(), 60);
    assert!((result.range.z - run.range().z).abs() < 1e-9);

    let plot = render_ascii_plot(&PlotData::from_result(&result), 60, 15);
    assert!(plot.contains(" | z="));
}
