//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums (`ModelKind`, `PhantomSpec`, `NanPolicy`)
//! - the loaded profile and its fit window (`Profile`, `FitWindow`)
//! - fit outputs (`FitResult`, `RangeEstimate`, `ResultFile`)

pub mod types;

pub use types::*;
