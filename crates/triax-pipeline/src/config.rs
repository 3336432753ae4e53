//! Session configuration.

use crate::CalibrationError;
use serde::{Deserialize, Serialize};
use triax_core::{CalibrationParams, Lmeds, Real, RobustOptions};
use triax_optim::SolveOptions;

/// Every tunable of a calibration run.
///
/// Missing fields take their defaults when deserialising, so a partial JSON
/// document is a valid configuration.
///
/// # Example
///
/// ```
/// use triax_pipeline::CalibrationConfig;
///
/// let config: CalibrationConfig =
///     serde_json::from_str(r#"{ "common_axis": true, "robust": { "threshold": 0.05 } }"#).unwrap();
/// assert!(config.common_axis);
/// assert_eq!(config.robust.threshold, 0.05);
/// assert!(config.refine_result);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Threshold, confidence, iteration limit, progress granularity and seed
    /// of the robust loop.
    pub robust: RobustOptions,
    /// Measurements per preliminary subset; `None` uses the model minimum.
    pub subset_size: Option<usize>,
    /// Fix `myx`, `mzx` and `mzy` to zero.
    pub common_axis: bool,
    /// Solve preliminary subsets in closed form. When `false` each subset is
    /// fitted by Levenberg–Marquardt from `initial_guess`.
    pub linear_preliminary: bool,
    /// Polish every preliminary solution by non-linear refinement on its subset.
    pub refine_preliminary: bool,
    /// Refine the winning candidate over its inliers.
    pub refine_result: bool,
    /// Estimate the parameter covariance of the result.
    pub keep_covariance: bool,
    /// Starting point of the non-linear preliminary solver; zero when `None`.
    pub initial_guess: Option<CalibrationParams>,
    /// Multiplier of the robust standard deviation used by LMedS and PROMedS
    /// to classify inliers.
    pub inlier_factor: Real,
    /// Levenberg–Marquardt settings for every refinement.
    pub solve: SolveOptions,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            robust: RobustOptions::default(),
            subset_size: None,
            common_axis: false,
            linear_preliminary: true,
            refine_preliminary: false,
            refine_result: true,
            keep_covariance: true,
            initial_guess: None,
            inlier_factor: Lmeds::DEFAULT_INLIER_FACTOR,
            solve: SolveOptions::default(),
        }
    }
}

impl CalibrationConfig {
    /// Subset size actually used for a model whose minimum is `min_measurements`.
    pub fn effective_subset_size(&self, min_measurements: usize) -> usize {
        self.subset_size.unwrap_or(min_measurements)
    }

    /// Check every field against its valid range.
    pub fn validate(&self, min_measurements: usize) -> Result<(), CalibrationError> {
        self.robust
            .validate()
            .map_err(|e| CalibrationError::InvalidConfiguration(e.to_string()))?;
        if let Some(k) = self.subset_size {
            if k < min_measurements {
                return Err(CalibrationError::InvalidConfiguration(format!(
                    "subset size {k} is below the minimum of {min_measurements} measurements"
                )));
            }
        }
        if !(self.inlier_factor.is_finite() && self.inlier_factor > 0.0) {
            return Err(CalibrationError::InvalidConfiguration(
                "inlier factor must be positive".into(),
            ));
        }
        if !self.solve.is_valid() {
            return Err(CalibrationError::InvalidConfiguration(
                "solver tolerances must be non-negative and max_iters positive".into(),
            ));
        }
        if self.initial_guess.is_some_and(|p| !p.is_finite()) {
            return Err(CalibrationError::InvalidConfiguration(
                "initial guess must be finite".into(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
