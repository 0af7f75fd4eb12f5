//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - detect the phantom kind and choose the fit window
//! - calibrate one model with Levenberg–Marquardt
//! - compare several models on the same window (parallel)

pub mod fitter;
pub mod selection;
pub mod window;

pub use fitter::*;
pub use selection::*;
pub use window::*;
