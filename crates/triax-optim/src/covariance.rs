//! Parameter covariance from a refined solution.
//!
//! With `J` the whitened residual Jacobian over the free parameters, the
//! covariance of the free parameters is `(J^T J)^-1`, optionally scaled by
//! the residual variance `chi_sq / dof`. Rows and columns of fixed
//! parameters are exactly zero in the returned 12x12 matrix.

use crate::Refinement;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use triax_core::{Cov12, Real};

/// Relative singular-value tolerance of the Jacobian.
const SINGULAR_TOLERANCE: Real = 1e-12;

/// How the inverse normal matrix is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceScaling {
    /// `(J^T W J)^-1` as is; appropriate when the measurement standard
    /// deviations are known.
    Unscaled,
    /// `(J^T J)^-1 * chi_sq / dof`.
    ResidualVariance,
}

impl CovarianceScaling {
    /// [`CovarianceScaling::Unscaled`] if every measurement carried a standard
    /// deviation, [`CovarianceScaling::ResidualVariance`] otherwise.
    pub fn for_refinement(refinement: &Refinement) -> Self {
        if refinement.fully_weighted {
            Self::Unscaled
        } else {
            Self::ResidualVariance
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CovarianceError {
    #[error("normal matrix is singular")]
    Singular,
    #[error("no residual degrees of freedom left to estimate the variance")]
    NoDegreesOfFreedom,
}

/// Estimate the 12x12 parameter covariance of a refined solution.
pub fn estimate_covariance(
    refinement: &Refinement,
    scaling: CovarianceScaling,
) -> Result<Cov12, CovarianceError> {
    // (J^T J)^-1 = V S^-2 V^T from the SVD of J
    let svd = refinement.jacobian.clone().svd(false, true);
    let v_t = svd.v_t.ok_or(CovarianceError::Singular)?;
    let s = &svd.singular_values;
    if s.is_empty() || s.len() < refinement.jacobian.ncols() {
        return Err(CovarianceError::Singular);
    }
    let s_max = s.max();
    if !(s_max.is_finite() && s.min() > SINGULAR_TOLERANCE * s_max) {
        return Err(CovarianceError::Singular);
    }
    let mut scaled_v = v_t.transpose();
    for (mut col, sv) in scaled_v.column_iter_mut().zip(s.iter()) {
        col.unscale_mut(sv * sv);
    }
    let inv = scaled_v * v_t;

    let factor = match scaling {
        CovarianceScaling::Unscaled => 1.0,
        CovarianceScaling::ResidualVariance => {
            if refinement.dof == 0 {
                return Err(CovarianceError::NoDegreesOfFreedom);
            }
            refinement.chi_sq / refinement.dof as Real
        }
    };

    let free = refinement.mask.free_indices();
    debug_assert_eq!(free.len(), inv.nrows());
    let mut cov = Cov12::zeros();
    for (a, &ia) in free.iter().enumerate() {
        for (b, &ib) in free.iter().enumerate() {
            cov[(ia, ib)] = inv[(a, b)] * factor;
        }
    }
    if cov.iter().any(|v| !v.is_finite()) {
        return Err(CovarianceError::Singular);
    }
    debug!("covariance estimated ({scaling:?}, factor {factor:.6e})");
    Ok(cov)
}
