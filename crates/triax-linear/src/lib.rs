//! Closed-form preliminary fits for triaxial sensor calibration.
//!
//! Every solver in this crate builds a linear least-squares system from a
//! (possibly minimal) set of measurements and returns a
//! [`CalibrationParams`] candidate without uncertainty information. The
//! robust engine calls these fits once per drawn subset, so a rank-deficient
//! subset is reported as [`LinearError::Degenerate`] and simply resampled.
//!
//! - [`fit_known_vector`]: per-axis regression of `observed - reference` on
//!   the reference vector.
//! - [`fit_known_magnitude`]: homogeneous quadric fit followed by a Cholesky
//!   factorisation of the shape matrix.
//!
//! # Example
//!
//! ```
//! use triax_core::{CalibrationParams, KnownVectorModel, Mat3, Measurement, Vec3};
//! use triax_linear::LinearFit;
//!
//! let truth = CalibrationParams::new(Vec3::new(0.2, -0.1, 0.3), Mat3::identity() * 0.01);
//! let refs = [
//!     Vec3::new(1.0, 0.0, 0.0),
//!     Vec3::new(0.0, 1.0, 0.0),
//!     Vec3::new(0.0, 0.0, 1.0),
//!     Vec3::new(1.0, 1.0, 1.0),
//! ];
//! let data: Vec<_> = refs.iter().map(|r| Measurement::new(truth.apply(r), *r)).collect();
//! let fit = KnownVectorModel.linear_fit(&data, false).unwrap();
//! assert!(fit.max_abs_diff(&truth) < 1e-10);
//! ```

mod known_magnitude;
mod known_vector;
mod math;

pub use known_magnitude::fit_known_magnitude;
pub use known_vector::fit_known_vector;
pub use math::{RANK_TOLERANCE, null_vector, solve_least_squares};

use thiserror::Error;
use triax_core::{CalibrationParams, MeasurementModel};

/// Errors reported by the closed-form fits.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinearError {
    #[error("need at least {needed} measurements, got {got}")]
    NotEnoughMeasurements { needed: usize, got: usize },
    /// The measurement subset does not determine the parameters.
    #[error("degenerate measurement configuration: {0}")]
    Degenerate(&'static str),
}

/// Measurement model with a closed-form preliminary solution.
pub trait LinearFit: MeasurementModel {
    /// Fit calibration parameters to `measurements`.
    ///
    /// With `common_axis` the fixed cross-coupling entries are excluded from
    /// the unknowns and returned as zero.
    fn linear_fit(
        &self,
        measurements: &[Self::Measurement],
        common_axis: bool,
    ) -> Result<CalibrationParams, LinearError>;
}
