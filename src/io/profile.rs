//! Profile text files.
//!
//! A profile is any whitespace-delimited sequence of numbers. Line breaks carry
//! no meaning: a single column, a single row and a matrix all flatten to the
//! same sample order (row by row).

use std::fs;
use std::path::Path;

use crate::domain::Profile;
use crate::error::AppError;

/// Read and flatten a profile file.
pub fn read_profile(path: &Path) -> Result<Profile, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read profile '{}': {e}", path.display())))?;
    let samples = parse_profile(&text, path)?;
    log::info!("read {} samples from {}", samples.len(), path.display());
    Ok(Profile {
        source: path.to_path_buf(),
        samples,
    })
}

/// Parse profile text; `source` only labels error messages.
pub fn parse_profile(text: &str, source: &Path) -> Result<Vec<f64>, AppError> {
    let mut samples = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            let value: f64 = token.parse().map_err(|_| {
                AppError::new(
                    2,
                    format!(
                        "{}:{}: invalid number '{token}'",
                        source.display(),
                        line_idx + 1
                    ),
                )
            })?;
            samples.push(value);
        }
    }

    if samples.is_empty() {
        return Err(AppError::new(3, format!("Profile '{}' contains no samples.", source.display())));
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_rows_and_columns() {
        let text = "0.1 0.2\n0.3\n\n  0.4\t0.5  \n";
        let v = parse_profile(text, Path::new("p.txt")).unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn accepts_exponents_and_signs() {
        let v = parse_profile("1e-3 -2.5E+1 +4", Path::new("p.txt")).unwrap();
        assert_eq!(v, vec![0.001, -25.0, 4.0]);
    }

    #[test]
    fn reports_bad_token_with_line() {
        let err = parse_profile("1 2\n3 x4\n", Path::new("beam.txt")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "beam.txt:2: invalid number 'x4'");
    }

    #[test]
    fn empty_file_is_a_data_error() {
        let err = parse_profile(" \n\n", Path::new("empty.txt")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = read_profile(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
