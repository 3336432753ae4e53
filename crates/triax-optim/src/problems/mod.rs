//! Least-squares problem builders.

pub mod calibration;

pub use calibration::CalibrationProblem;
