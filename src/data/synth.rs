//! Synthetic activity profiles for demos and tests.
//!
//! Shapes (positions from the usual `shift + i·step` grid):
//! - pencil beam: linear build-up from 0.3 to 1.0 at `z - 3·width`, multiplied
//!   by a logistic falloff centred on `z`
//! - cube: slowly attenuating plateau followed by a logistic falloff at `z`
//!
//! Gaussian noise is drawn from a seeded `StdRng`, so the same settings always
//! produce the same file.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{GridSpec, PhantomKind};
use crate::error::AppError;
use crate::math::gen_lin;

/// Attenuation of the cube plateau per mm.
const CUBE_SLOPE: f64 = 0.002;
/// Residual activity after the falloff.
const BACKGROUND: f64 = 0.03;

/// Settings for one synthetic profile.
#[derive(Debug, Clone)]
pub struct SynthSpec {
    pub phantom: PhantomKind,
    /// Falloff position (mm).
    pub z: f64,
    /// Logistic width of the falloff (mm).
    pub width: f64,
    /// Standard deviation of the additive noise.
    pub noise: f64,
    pub seed: u64,
    pub grid: GridSpec,
}

impl SynthSpec {
    /// Typical settings for the given phantom.
    pub fn for_phantom(phantom: PhantomKind) -> Self {
        let (z, width) = match phantom {
            PhantomKind::PencilBeam => (93.0, 1.5),
            PhantomKind::Cube => (100.0, 4.0),
        };
        Self {
            phantom,
            z,
            width,
            noise: 0.01,
            seed: 0,
            grid: GridSpec::default(),
        }
    }
}

/// Generate the samples of a synthetic profile.
pub fn simulate(spec: &SynthSpec) -> Result<Vec<f64>, AppError> {
    if !spec.z.is_finite() {
        return Err(AppError::new(2, "Falloff position must be finite."));
    }
    if !(spec.width.is_finite() && spec.width > 0.0) {
        return Err(AppError::new(2, format!("Invalid falloff width {}: must be positive.", spec.width)));
    }
    if !(spec.noise.is_finite() && spec.noise >= 0.0) {
        return Err(AppError::new(2, format!("Invalid noise level {}: must be >= 0.", spec.noise)));
    }
    if !(spec.grid.step.is_finite() && spec.grid.step > 0.0) {
        return Err(AppError::new(2, "Invalid bin step: must be positive."));
    }

    let bins = spec.grid.bins.unwrap_or_else(|| spec.phantom.default_bins());
    let xs = gen_lin(bins, spec.grid.shift, spec.grid.step);

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, spec.noise)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let samples = xs
        .iter()
        .map(|&x| {
            let clean = match spec.phantom {
                PhantomKind::PencilBeam => pencil_beam(x, spec.z, spec.width),
                PhantomKind::Cube => cube(x, spec.z, spec.width),
            };
            let noisy = if spec.noise > 0.0 {
                clean + normal.sample(&mut rng)
            } else {
                clean
            };
            noisy.max(0.0)
        })
        .collect();

    log::debug!(
        "simulated {} profile: {bins} bins, z={}, width={}, noise={}, seed={}",
        spec.phantom.display_name(),
        spec.z,
        spec.width,
        spec.noise,
        spec.seed
    );
    Ok(samples)
}

fn falloff(x: f64, z: f64, width: f64) -> f64 {
    1.0 / (1.0 + ((x - z) / width).exp())
}

fn pencil_beam(x: f64, z: f64, width: f64) -> f64 {
    let peak = (z - 3.0 * width).max(f64::MIN_POSITIVE);
    let build_up = 0.3 + 0.7 * (x / peak).clamp(0.0, 1.0);
    build_up * falloff(x, z, width) + BACKGROUND
}

fn cube(x: f64, z: f64, width: f64) -> f64 {
    let plateau = 1.0 - CUBE_SLOPE * x;
    (plateau - BACKGROUND) * falloff(x, z, width) + BACKGROUND
}

/// Write samples one per line, in the format `read_profile` accepts.
pub fn write_profile(path: &Path, samples: &[f64]) -> Result<(), AppError> {
    let mut out = String::with_capacity(samples.len() * 10);
    for v in samples {
        let _ = writeln!(out, "{v:.6}");
    }
    fs::write(path, out)
        .map_err(|e| AppError::new(2, format!("Failed to write profile '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::detect_phantom;

    #[test]
    fn same_seed_gives_same_profile() {
        let spec = SynthSpec {
            seed: 7,
            ..SynthSpec::for_phantom(PhantomKind::Cube)
        };
        assert_eq!(simulate(&spec).unwrap(), simulate(&spec).unwrap());

        let other = SynthSpec { seed: 8, ..spec.clone() };
        assert_ne!(simulate(&spec).unwrap(), simulate(&other).unwrap());
    }

    #[test]
    fn generated_profiles_are_detected_correctly() {
        for phantom in [PhantomKind::PencilBeam, PhantomKind::Cube] {
            let spec = SynthSpec {
                noise: 0.0,
                ..SynthSpec::for_phantom(phantom)
            };
            let samples = simulate(&spec).unwrap();
            assert_eq!(samples.len(), phantom.default_bins());
            assert_eq!(detect_phantom(&samples).unwrap(), phantom);
        }
    }

    #[test]
    fn falloff_is_at_half_height() {
        let spec = SynthSpec {
            noise: 0.0,
            z: 101.25,
            ..SynthSpec::for_phantom(PhantomKind::Cube)
        };
        let samples = simulate(&spec).unwrap();
        // bin 40 is centred on 101.25
        let expected = (1.0 - CUBE_SLOPE * 101.25 - BACKGROUND) * 0.5 + BACKGROUND;
        assert!((samples[40] - expected).abs() < 1e-12);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let spec = SynthSpec {
            width: 0.0,
            ..SynthSpec::for_phantom(PhantomKind::Cube)
        };
        assert_eq!(simulate(&spec).unwrap_err().exit_code(), 2);
        let spec = SynthSpec {
            noise: -1.0,
            ..SynthSpec::for_phantom(PhantomKind::Cube)
        };
        assert!(simulate(&spec).is_err());
    }
}
