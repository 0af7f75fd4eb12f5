//! Numerical building blocks: position grids, gradients, parameter covariance
//! and the Levenberg–Marquardt driver.

pub mod covariance;
pub mod gradient;
pub mod grid;
pub mod lm;

pub use covariance::*;
pub use gradient::*;
pub use grid::*;
pub use lm::*;
