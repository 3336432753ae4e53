//! Session state and result types.

use serde::{Deserialize, Serialize};
use triax_core::{CalibrationParams, Cov12, Mat3, ParamVec, Real, RobustMethod, Vec3};

/// Lifecycle state of a [`super::CalibrationSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// Configuration and measurements may be changed.
    #[default]
    Idle,
    /// `calibrate()` is executing; every mutator is locked.
    Running,
}

/// Result of a successful calibration.
///
/// `mse`, `chi_sq` and `covariance` keep their neutral values (`0`, `0`,
/// `None`) when neither refinement is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEstimate {
    pub params: CalibrationParams,
    /// 12x12 covariance in [`triax_core::ParamIndex`] order.
    pub covariance: Option<Cov12>,
    /// Mean squared residual over the inliers.
    pub mse: Real,
    /// Chi-square of the whitened residuals over the inliers.
    pub chi_sq: Real,
}

impl CalibrationEstimate {
    /// Covariance block of the bias.
    pub fn bias_covariance(&self) -> Option<Mat3> {
        self.covariance
            .map(|c| c.fixed_view::<3, 3>(0, 0).into_owned())
    }

    /// Standard deviation of every parameter, zero for fixed ones.
    pub fn std_devs(&self) -> Option<ParamVec> {
        self.covariance
            .map(|c| c.diagonal().map(|v| v.max(0.0).sqrt()))
    }

    /// Standard deviation of the bias components.
    pub fn bias_std_dev(&self) -> Option<Vec3> {
        self.std_devs()
            .map(|s| Vec3::new(s[0], s[1], s[2]))
    }
}

/// Serialisable summary of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub method: RobustMethod,
    pub common_axis: bool,
    pub params: CalibrationParams,
    pub covariance: Option<Cov12>,
    pub mse: Real,
    pub chi_sq: Real,
    pub num_measurements: usize,
    pub num_inliers: usize,
    pub outlier_ratio: Real,
    pub inlier_threshold: Real,
    /// Scored iterations of the robust loop.
    pub iterations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use triax_core::ParamIndex;

    #[test]
    fn std_devs_follow_the_diagonal() {
        let mut cov = Cov12::zeros();
        cov[(ParamIndex::BY, ParamIndex::BY)] = 4.0;
        cov[(ParamIndex::SX, ParamIndex::SX)] = 0.25;
        let estimate = CalibrationEstimate {
            params: CalibrationParams::default(),
            covariance: Some(cov),
            mse: 1.0,
            chi_sq: 2.0,
        };
        let s = estimate.std_devs().unwrap();
        assert_eq!(s[ParamIndex::BY], 2.0);
        assert_eq!(s[ParamIndex::SX], 0.5);
        assert_eq!(s[ParamIndex::MZY], 0.0);
        assert_eq!(estimate.bias_std_dev().unwrap(), Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(estimate.bias_covariance().unwrap()[(1, 1)], 4.0);
    }
}
