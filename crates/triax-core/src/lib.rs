//! Core math, parameter and measurement types for `triax`.
//!
//! This crate provides the foundational building blocks used by all other
//! crates in the workspace:
//!
//! - linear algebra type aliases (`Real`, `Vec3`, `Mat3`, ...),
//! - the calibration parameter set (bias + scale/cross-coupling matrix) and
//!   its 12-entry parameter layout,
//! - measurement models mapping parameters to predicted readings,
//! - a deterministic, model-agnostic robust estimation engine with five
//!   scoring strategies (RANSAC, LMedS, MSAC, PROSAC, PROMedS).
//!
//! Sensor model (conceptually):
//! `observed = bias + (I + M) * true`
//!
//! # Modules
//!
//! - \[`math`\]: basic type aliases.
//! - \[`params`\]: calibration parameters and fix masks.
//! - \[`models`\]: measurement models.
//! - \[`robust`\]: robust estimation engine.
//! - \[`synthetic`\]: deterministic synthetic data helpers (tests/examples).
//!
//! # Example
//!
//! ```
//! use triax_core::{CalibrationParams, KnownVectorModel, Measurement, MeasurementModel, Mat3, Vec3};
//!
//! let params = CalibrationParams::new(
//!     Vec3::new(0.1, -0.2, 0.05),
//!     Mat3::new(0.01, 0.002, 0.0, 0.0, -0.02, 0.001, 0.0, 0.0, 0.015),
//! );
//! let reference = Vec3::new(0.0, 0.0, 9.81);
//! let m = Measurement::new(params.apply(&reference), reference);
//! let r = KnownVectorModel.residual_norm(&params, &m);
//! assert!(r < 1e-12);
//! ```

/// Linear algebra type aliases.
mod math;
/// Measurement models.
pub mod models;
/// Calibration parameters and parameter layout.
mod params;
/// Robust estimation engine and scoring strategies.
pub mod robust;
/// Deterministic synthetic data generation helpers.
///
/// Used in workspace tests and examples; not intended for production use.
pub mod synthetic;

pub use math::*;
pub use models::*;
pub use params::*;
pub use robust::{
    CandidateSolver, InliersData, Lmeds, Msac, NoopObserver, Promeds, Prosac, Ransac,
    RobustError, RobustMethod, RobustObserver, RobustOptions, RobustOutcome, Sampling, Score,
    ScoringStrategy,
};
