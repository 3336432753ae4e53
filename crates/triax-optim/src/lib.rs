//! Non-linear refinement and covariance estimation for triaxial sensor
//! calibration.
//!
//! The crate is organised around a small dense least-squares interface:
//!
//! - [`NllsProblem`]: residuals and Jacobian over a reduced parameter vector,
//!   with per-row whitening.
//! - [`NllsSolverBackend`] / [`backend::LmBackend`]: Levenberg–Marquardt
//!   from the `levenberg-marquardt` crate.
//! - [`problems::CalibrationProblem`]: any [`triax_core::MeasurementModel`]
//!   over the free calibration parameters.
//!
//! On top of it, [`refine`] polishes a calibration estimate over a
//! measurement set, [`linearize`] evaluates a fixed estimate, and
//! [`estimate_covariance`] propagates the measurement uncertainty of either
//! into a 12x12 parameter covariance.

pub mod backend;
mod covariance;
pub mod problems;
mod refine;
mod traits;

pub use covariance::{CovarianceError, CovarianceScaling, estimate_covariance};
pub use refine::{RefineError, Refinement, linearize, refine};
pub use traits::*;
