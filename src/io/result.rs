//! Read/write result JSON files.
//!
//! A result file is the portable record of one fit:
//! - model kind, parameters and quality statistics
//! - phantom kind and window
//! - the raw profile on its grid and a dense fitted curve for quick plotting
//!
//! The schema is defined by `domain::ResultFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::app::pipeline::RunOutput;
use crate::domain::{ResultFile, SeriesGrid};
use crate::error::AppError;

/// Build the serializable record of a run.
pub fn result_file(run: &RunOutput) -> ResultFile {
    let prepared = &run.prepared;
    ResultFile {
        tool: format!("falloff {}", env!("CARGO_PKG_VERSION")),
        generated_at: Utc::now(),
        source: prepared.profile.source.clone(),
        phantom: prepared.phantom,
        window: prepared.window,
        fit: run.fit.clone(),
        range: run.range(),
        profile: SeriesGrid {
            position: prepared.grid.clone(),
            intensity: prepared.profile.samples.clone(),
        },
        curve: run.curve.clone(),
    }
}

/// Write a result JSON file.
pub fn write_result_json(path: &Path, run: &RunOutput) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create result JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &result_file(run))
        .map_err(|e| AppError::new(2, format!("Failed to write result JSON: {e}")))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

/// Read a result JSON file.
pub fn read_result_json(path: &Path) -> Result<ResultFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open result JSON '{}': {e}", path.display())))?;
    let result: ResultFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid result JSON: {e}")))?;
    if result.profile.position.len() != result.profile.intensity.len()
        || result.curve.position.len() != result.curve.intensity.len()
    {
        return Err(AppError::new(3, "Result JSON series have mismatched lengths."));
    }
    if result.profile.position.windows(2).any(|w| !w[0].lt(&w[1])) {
        return Err(AppError::new(3, "Result JSON profile positions are not strictly increasing."));
    }
    Ok(result)
}
