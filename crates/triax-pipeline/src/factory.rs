//! Session construction shortcuts.

use crate::CalibrationSession;
use triax_core::{KnownMagnitudeModel, KnownVectorModel, RobustMethod};
use triax_linear::LinearFit;

/// Session calibrating against known reference vectors.
pub type KnownVectorCalibrator = CalibrationSession<KnownVectorModel>;

/// Session calibrating against a known signal magnitude.
pub type KnownMagnitudeCalibrator = CalibrationSession<KnownMagnitudeModel>;

/// Idle session over `measurements` using `method`.
pub fn create<M: LinearFit + Clone>(
    model: M,
    measurements: Vec<M::Measurement>,
    method: RobustMethod,
) -> CalibrationSession<M> {
    CalibrationSession::with_measurements(model, measurements, method)
}

/// Idle session over `measurements` using LMedS.
pub fn create_default<M: LinearFit + Clone>(
    model: M,
    measurements: Vec<M::Measurement>,
) -> CalibrationSession<M> {
    create(model, measurements, RobustMethod::default())
}
