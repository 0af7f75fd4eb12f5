//! Export per-sample results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts:
//! one row per grid bin with the observed intensity and the fitted value.

use std::path::Path;

use serde::Serialize;

use crate::app::pipeline::RunOutput;
use crate::error::AppError;

#[derive(Debug, Serialize)]
struct SampleRow {
    position: f64,
    intensity: f64,
    in_window: bool,
    fitted: f64,
    residual: f64,
}

/// Write the per-bin results of a run to a CSV file.
pub fn write_results_csv(path: &Path, run: &RunOutput) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    let prepared = &run.prepared;
    let fitted = run.fitted_on_grid();
    for (i, (&position, &intensity)) in prepared.grid.iter().zip(prepared.profile.samples.iter()).enumerate() {
        let row = SampleRow {
            position,
            intensity,
            in_window: prepared.selection.indices.binary_search(&i).is_ok(),
            fitted: fitted[i],
            residual: fitted[i] - intensity,
        };
        writer
            .serialize(row)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV '{}': {e}", path.display())))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::app::pipeline::run_loaded;
    use crate::domain::{FitConfig, Profile};
    use crate::math::gen_lin;

    #[test]
    fn csv_has_one_row_per_bin() {
        let samples = gen_lin(60, 1.25, 2.5)
            .iter()
            .map(|&x| 0.9 / (1.0 + ((x - 99.5) / 4.0).exp()) + 0.05)
            .collect();
        let profile = Profile {
            source: PathBuf::from("cube.txt"),
            samples,
        };
        let run = run_loaded(profile, &FitConfig::default()).unwrap();

        let path = std::env::temp_dir().join(format!("falloff-export-{}.csv", std::process::id()));
        write_results_csv(&path, &run).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("position,intensity,in_window,fitted,residual"));
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 60);
        let in_window = rows.iter().filter(|r| r.contains(",true,")).count();
        assert_eq!(in_window, run.prepared.selection.indices.len());
    }
}
