use thiserror::Error;
use triax_core::RobustError;

/// Errors reported by a [`crate::CalibrationSession`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    /// `calibrate()` was called before the session had what it needs.
    #[error("session is not ready: {0}")]
    NotReady(String),
    /// A mutator or `calibrate()` was called while a calibration is running.
    #[error("session is locked while calibration is running")]
    Locked,
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// The robust loop never scored a candidate.
    #[error("estimation failed after {iterations} iterations ({degenerate} degenerate subsets)")]
    EstimationFailed { iterations: usize, degenerate: usize },
}

impl From<RobustError> for CalibrationError {
    fn from(err: RobustError) -> Self {
        match err {
            RobustError::EstimationFailed {
                iterations,
                degenerate,
            } => Self::EstimationFailed {
                iterations,
                degenerate,
            },
            RobustError::InvalidOptions(msg) => Self::InvalidConfiguration(msg.to_string()),
            other @ (RobustError::NotEnoughData { .. }
            | RobustError::MissingQualityScores
            | RobustError::QualityScoresLength { .. }) => Self::NotReady(other.to_string()),
        }
    }
}
