//! Synthetic data sources.

pub mod synth;

pub use synth::*;
