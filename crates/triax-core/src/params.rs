//! Calibration parameters of a triaxial sensor.
//!
//! The sensor reading is modelled as
//!
//! ```text
//! observed = b + (I + M) * true
//!
//!     | sx   mxy  mxz |
//! M = | myx  sy   myz |
//!     | mzx  mzy  sz  |
//! ```
//!
//! where `b` is the bias (hard iron) and `M` holds the scale factors on the
//! diagonal and the cross-coupling terms off the diagonal (soft iron).

use crate::{Mat3, ParamVec, Real, Vec3};
use serde::{Deserialize, Serialize};

/// Number of entries in the full calibration parameter vector.
pub const NUM_PARAMS: usize = 12;

/// Index of each calibration parameter in the full parameter vector.
///
/// Layout: `[bx, by, bz, sx, sy, sz, mxy, mxz, myx, myz, mzx, mzy]`.
pub struct ParamIndex;

impl ParamIndex {
    pub const BX: usize = 0;
    pub const BY: usize = 1;
    pub const BZ: usize = 2;
    pub const SX: usize = 3;
    pub const SY: usize = 4;
    pub const SZ: usize = 5;
    pub const MXY: usize = 6;
    pub const MXZ: usize = 7;
    pub const MYX: usize = 8;
    pub const MYZ: usize = 9;
    pub const MZX: usize = 10;
    pub const MZY: usize = 11;

    /// Parameters fixed to zero by the common-axis assumption.
    pub const COMMON_AXIS_FIXED: [usize; 3] = [Self::MYX, Self::MZX, Self::MZY];

    /// `(row, col)` of the matrix entry stored at parameter `idx`, if any.
    pub const fn matrix_entry(idx: usize) -> Option<(usize, usize)> {
        match idx {
            Self::SX => Some((0, 0)),
            Self::SY => Some((1, 1)),
            Self::SZ => Some((2, 2)),
            Self::MXY => Some((0, 1)),
            Self::MXZ => Some((0, 2)),
            Self::MYX => Some((1, 0)),
            Self::MYZ => Some((1, 2)),
            Self::MZX => Some((2, 0)),
            Self::MZY => Some((2, 1)),
            _ => None,
        }
    }

    /// Parameter index of the matrix entry `(row, col)`.
    pub const fn of_matrix_entry(row: usize, col: usize) -> usize {
        match (row, col) {
            (0, 0) => Self::SX,
            (1, 1) => Self::SY,
            (2, 2) => Self::SZ,
            (0, 1) => Self::MXY,
            (0, 2) => Self::MXZ,
            (1, 0) => Self::MYX,
            (1, 2) => Self::MYZ,
            (2, 0) => Self::MZX,
            _ => Self::MZY,
        }
    }
}

/// Bias and scale/cross-coupling matrix of a triaxial sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    /// Additive bias `b`.
    pub bias: Vec3,
    /// Scale factors (diagonal) and cross-coupling terms (off-diagonal), `M`.
    pub cross_coupling: Mat3,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            bias: Vec3::zeros(),
            cross_coupling: Mat3::zeros(),
        }
    }
}

impl CalibrationParams {
    pub fn new(bias: Vec3, cross_coupling: Mat3) -> Self {
        Self {
            bias,
            cross_coupling,
        }
    }

    /// Build from the full 12-entry parameter vector.
    pub fn from_vector(v: &ParamVec) -> Self {
        let mut m = Mat3::zeros();
        for idx in ParamIndex::SX..NUM_PARAMS {
            if let Some((r, c)) = ParamIndex::matrix_entry(idx) {
                m[(r, c)] = v[idx];
            }
        }
        Self {
            bias: Vec3::new(v[ParamIndex::BX], v[ParamIndex::BY], v[ParamIndex::BZ]),
            cross_coupling: m,
        }
    }

    /// Full 12-entry parameter vector in [`ParamIndex`] order.
    pub fn to_vector(&self) -> ParamVec {
        let mut v = ParamVec::zeros();
        v[ParamIndex::BX] = self.bias.x;
        v[ParamIndex::BY] = self.bias.y;
        v[ParamIndex::BZ] = self.bias.z;
        for idx in ParamIndex::SX..NUM_PARAMS {
            if let Some((r, c)) = ParamIndex::matrix_entry(idx) {
                v[idx] = self.cross_coupling[(r, c)];
            }
        }
        v
    }

    pub fn bx(&self) -> Real {
        self.bias.x
    }

    pub fn by(&self) -> Real {
        self.bias.y
    }

    pub fn bz(&self) -> Real {
        self.bias.z
    }

    pub fn sx(&self) -> Real {
        self.cross_coupling[(0, 0)]
    }

    pub fn sy(&self) -> Real {
        self.cross_coupling[(1, 1)]
    }

    pub fn sz(&self) -> Real {
        self.cross_coupling[(2, 2)]
    }

    pub fn mxy(&self) -> Real {
        self.cross_coupling[(0, 1)]
    }

    pub fn mxz(&self) -> Real {
        self.cross_coupling[(0, 2)]
    }

    pub fn myx(&self) -> Real {
        self.cross_coupling[(1, 0)]
    }

    pub fn myz(&self) -> Real {
        self.cross_coupling[(1, 2)]
    }

    pub fn mzx(&self) -> Real {
        self.cross_coupling[(2, 0)]
    }

    pub fn mzy(&self) -> Real {
        self.cross_coupling[(2, 1)]
    }

    /// Scale factors `(sx, sy, sz)`.
    pub fn scale_factors(&self) -> Vec3 {
        self.cross_coupling.diagonal()
    }

    /// The full sensor transform `I + M`.
    pub fn transform(&self) -> Mat3 {
        Mat3::identity() + self.cross_coupling
    }

    /// Predict a reading from the true signal: `b + (I + M) * t`.
    pub fn apply(&self, true_value: &Vec3) -> Vec3 {
        self.bias + self.transform() * true_value
    }

    /// Recover the true signal from a reading: `(I + M)^-1 (observed - b)`.
    ///
    /// Returns `None` when `I + M` is singular.
    pub fn correct(&self, observed: &Vec3) -> Option<Vec3> {
        let t_inv = self.transform().try_inverse()?;
        Some(t_inv * (observed - self.bias))
    }

    /// Copy with the common-axis entries (`myx`, `mzx`, `mzy`) set to zero.
    pub fn with_common_axis(mut self) -> Self {
        for idx in ParamIndex::COMMON_AXIS_FIXED {
            if let Some((r, c)) = ParamIndex::matrix_entry(idx) {
                self.cross_coupling[(r, c)] = 0.0;
            }
        }
        self
    }

    /// Largest absolute difference over all 12 parameters.
    pub fn max_abs_diff(&self, other: &Self) -> Real {
        (self.to_vector() - other.to_vector()).amax()
    }

    pub fn is_finite(&self) -> bool {
        self.to_vector().iter().all(|v| v.is_finite())
    }
}

/// Mask for fixing calibration parameters during estimation.
///
/// Fixed parameters keep the value of the starting estimate (zero under the
/// common-axis assumption) and are excluded from the optimisation vector.
///
/// # Example
///
/// ```
/// use triax_core::{ParamIndex, ParamMask};
///
/// let mask = ParamMask::common_axis();
/// assert!(mask.is_fixed(ParamIndex::MYX));
/// assert_eq!(mask.num_free(), 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParamMask {
    fixed: [bool; NUM_PARAMS],
}

impl ParamMask {
    /// Mask that leaves all 12 parameters free.
    pub fn all_free() -> Self {
        Self::default()
    }

    /// Mask fixing `myx`, `mzx` and `mzy`.
    pub fn common_axis() -> Self {
        let mut mask = Self::default();
        for idx in ParamIndex::COMMON_AXIS_FIXED {
            mask.fixed[idx] = true;
        }
        mask
    }

    /// Select [`ParamMask::common_axis`] or [`ParamMask::all_free`].
    pub fn for_common_axis(common_axis: bool) -> Self {
        if common_axis {
            Self::common_axis()
        } else {
            Self::all_free()
        }
    }

    pub fn is_fixed(&self, idx: usize) -> bool {
        self.fixed[idx]
    }

    pub fn num_free(&self) -> usize {
        self.fixed.iter().filter(|f| !**f).count()
    }

    /// Indices of the free parameters in [`ParamIndex`] order.
    pub fn free_indices(&self) -> Vec<usize> {
        (0..NUM_PARAMS).filter(|&i| !self.fixed[i]).collect()
    }

    /// Extract the free parameters into a reduced vector.
    pub fn pack(&self, params: &CalibrationParams) -> nalgebra::DVector<Real> {
        let full = params.to_vector();
        let free = self.free_indices();
        nalgebra::DVector::from_iterator(free.len(), free.iter().map(|&i| full[i]))
    }

    /// Write the reduced vector `x` back over `base`, keeping fixed entries.
    pub fn unpack(&self, x: &nalgebra::DVector<Real>, base: &CalibrationParams) -> CalibrationParams {
        let mut full = base.to_vector();
        for (k, idx) in self.free_indices().into_iter().enumerate() {
            full[idx] = x[k];
        }
        CalibrationParams::from_vector(&full)
    }
}
