//! Deterministic synthetic data generation helpers.
//!
//! This module provides small, reusable building blocks for constructing
//! synthetic calibration problems used in tests and examples:
//! - deterministic pseudo-random noise (uniform and Gaussian),
//! - reference directions spread over the unit sphere,
//! - measurement sets with a controlled fraction of gross outliers.
//!
//! The helpers are deterministic (explicit seeds; stable ordering) and do
//! not depend on the internal algorithm of `rand` RNGs.
//!
//! # Example
//!
//! ```
//! use triax_core::synthetic::triaxial::{DatasetSpec, known_vector_dataset};
//! use triax_core::CalibrationParams;
//!
//! let spec = DatasetSpec { count: 50, outlier_fraction: 0.2, ..DatasetSpec::default() };
//! let data = known_vector_dataset(&CalibrationParams::default(), &spec);
//! assert_eq!(data.measurements.len(), 50);
//! assert_eq!(data.outliers.iter().filter(|o| **o).count(), 10);
//! ```

pub mod noise;
pub mod triaxial;
