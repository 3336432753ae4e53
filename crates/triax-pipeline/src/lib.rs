//! Robust calibration session for triaxial sensors.
//!
//! This crate wires the building blocks of the workspace into a single
//! stateful workflow:
//!
//! 1. draw measurement subsets with the robust engine from `triax-core`
//!    (RANSAC, LMedS, MSAC, PROSAC or PROMedS),
//! 2. solve every subset with a preliminary solver (closed form from
//!    `triax-linear`, or Levenberg–Marquardt from `triax-optim`),
//! 3. refine the winning candidate over its inliers and estimate the
//!    parameter covariance.
//!
//! ```
//! use triax_core::synthetic::triaxial::{DatasetSpec, known_magnitude_dataset, random_params};
//! use triax_core::{KnownMagnitudeModel, RobustMethod};
//! use triax_pipeline::{CalibrationSession, factory};
//! # fn main() -> anyhow::Result<()> {
//! let truth = random_params(5, 0.3, 0.02, true);
//! let data = known_magnitude_dataset(
//!     &truth,
//!     &DatasetSpec { outlier_fraction: 0.2, ..DatasetSpec::default() },
//! );
//!
//! let mut session: CalibrationSession<_> =
//!     factory::create(KnownMagnitudeModel, data.measurements, RobustMethod::Msac);
//! session.set_common_axis(true)?;
//! session.set_threshold(1e-3)?;
//! session.calibrate()?;
//!
//! let report = session.report().unwrap();
//! assert!(report.params.max_abs_diff(&truth) < 1e-5);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod factory;
pub mod preliminary;
pub mod session;

pub use config::CalibrationConfig;
pub use error::CalibrationError;
pub use factory::{KnownMagnitudeCalibrator, KnownVectorCalibrator};
pub use preliminary::PreliminarySolver;
pub use session::{
    CalibrationEstimate, CalibrationListener, CalibrationReport, CalibrationSession, SessionState,
};
