//! High-level entry crate for `triax`, robust calibration of triaxial
//! sensors.
//!
//! A triaxial sensor reading is modelled as
//! `observed = bias + (I + M) * true`, where `M` holds the scale-factor
//! errors on its diagonal and the cross-coupling errors elsewhere. Two
//! measurement models are supported:
//!
//! - known reference vector (e.g. gravity in a known orientation),
//! - known reference magnitude (e.g. local gravity or geomagnetic field
//!   strength at unknown orientations).
//!
//! # Quick Start
//!
//! ```
//! use triax::prelude::*;
//! use triax::synthetic::triaxial::{DatasetSpec, known_vector_dataset, random_params};
//! # fn main() -> anyhow::Result<()> {
//! let truth = random_params(1, 0.5, 0.02, false);
//! let data = known_vector_dataset(
//!     &truth,
//!     &DatasetSpec { outlier_fraction: 0.3, inlier_std_dev: 1e-3, ..DatasetSpec::default() },
//! );
//!
//! let mut session = KnownVectorCalibrator::with_measurements(
//!     KnownVectorModel,
//!     data.measurements,
//!     RobustMethod::Lmeds,
//! );
//! session.calibrate()?;
//!
//! let params = session.estimated_params().unwrap();
//! assert!(params.max_abs_diff(&truth) < 1e-2);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`pipeline`] - calibration session, configuration and listener
//! - [`core`] - parameters, measurement models, robust estimation engine
//! - [`linear`] - closed-form preliminary fits
//! - [`optim`] - Levenberg–Marquardt refinement and covariance
//! - [`synthetic`] - deterministic synthetic datasets

/// Calibration session, configuration and listener.
///
/// Re-exports everything from `triax_pipeline`.
pub mod pipeline {
    pub use triax_pipeline::*;
}

/// Parameters, measurement models and the robust estimation engine.
///
/// Re-exports everything from `triax_core`.
pub mod core {
    pub use triax_core::*;
}

/// Closed-form preliminary fits.
pub mod linear {
    pub use triax_linear::*;
}

/// Non-linear refinement and covariance estimation.
pub mod optim {
    pub use triax_optim::*;
}

/// Deterministic synthetic data generation for testing.
pub mod synthetic {
    pub use triax_core::synthetic::*;
}

pub use triax_core::{
    CalibrationParams, Cov12, InliersData, KnownMagnitudeModel, KnownVectorModel,
    MagnitudeMeasurement, Mat3, Measurement, MeasurementModel, ParamIndex, Real, RobustMethod,
    RobustOptions, Vec3, VectorMeasurement,
};
pub use triax_linear::LinearFit;
pub use triax_optim::SolveOptions;
pub use triax_pipeline::{
    CalibrationConfig, CalibrationError, CalibrationEstimate, CalibrationListener,
    CalibrationReport, CalibrationSession, KnownMagnitudeCalibrator, KnownVectorCalibrator,
    SessionState, factory,
};

/// Convenient re-exports for common use cases.
pub mod prelude {
    // Session
    pub use crate::{
        CalibrationConfig, CalibrationError, CalibrationListener, CalibrationSession,
        KnownMagnitudeCalibrator, KnownVectorCalibrator, SessionState,
    };

    // Models and parameters
    pub use crate::{
        CalibrationParams, KnownMagnitudeModel, KnownVectorModel, MagnitudeMeasurement, Mat3,
        Measurement, RobustMethod, Vec3, VectorMeasurement,
    };
}
