//! Input/output helpers.
//!
//! - profile text reader (`profile`)
//! - per-bin CSV exports (`export`)
//! - result JSON read/write (`result`)

pub mod export;
pub mod profile;
pub mod result;

pub use export::*;
pub use profile::*;
pub use result::*;
