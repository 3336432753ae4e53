//! Calibration session.
//!
//! A [`CalibrationSession`] is a mutable state container holding the
//! configuration, the measurements and the result of the last run. It is
//! either [`SessionState::Idle`] (everything may change) or
//! [`SessionState::Running`] (everything is locked until `calibrate()`
//! returns).
//!
//! ```
//! use triax_core::synthetic::triaxial::{DatasetSpec, known_vector_dataset, random_params};
//! use triax_core::{KnownVectorModel, RobustMethod};
//! use triax_pipeline::session::CalibrationSession;
//! # fn main() -> anyhow::Result<()> {
//! let truth = random_params(3, 0.5, 0.02, false);
//! let data = known_vector_dataset(&truth, &DatasetSpec::default());
//!
//! let mut session = CalibrationSession::with_measurements(
//!     KnownVectorModel,
//!     data.measurements,
//!     RobustMethod::Lmeds,
//! );
//! session.calibrate()?;
//!
//! let fit = session.estimated_params().unwrap();
//! assert!(fit.max_abs_diff(&truth) < 1e-6);
//! # Ok(())
//! # }
//! ```

pub mod calibsession;
pub mod listener;
pub mod types;

pub use calibsession::CalibrationSession;
pub use listener::CalibrationListener;
pub use types::{CalibrationEstimate, CalibrationReport, SessionState};
