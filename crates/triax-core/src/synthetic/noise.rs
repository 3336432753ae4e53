//! Deterministic noise helpers for synthetic datasets.
//!
//! The functions here avoid `thread_rng` and do not depend on the internal
//! algorithm of `rand` RNGs. This keeps synthetic datasets stable across
//! versions and platforms.

use crate::{Real, Vec3};

/// Deterministic Gaussian noise keyed by `(sample_idx, axis)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianNoise {
    /// Base seed controlling the pseudo-random sequence.
    pub seed: u64,
    /// Standard deviation of every component.
    pub std_dev: Real,
}

impl GaussianNoise {
    pub fn new(seed: u64, std_dev: Real) -> Self {
        Self { seed, std_dev }
    }

    /// Sample one standard-normal value scaled by `std_dev` (Box–Muller).
    #[inline]
    pub fn sample(&self, sample_idx: usize, axis: usize) -> Real {
        if self.std_dev == 0.0 {
            return 0.0;
        }
        let key = mix_key(self.seed, sample_idx, axis);
        // (0, 1] keeps the logarithm finite.
        let u1 = 1.0 - u64_to_unit_f64(splitmix64(key));
        let u2 = u64_to_unit_f64(splitmix64(key ^ 0x94D0_49BB_1331_11EB));
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        z * self.std_dev
    }

    /// Sample a 3D noise vector.
    #[inline]
    pub fn sample_vec3(&self, sample_idx: usize) -> Vec3 {
        Vec3::new(
            self.sample(sample_idx, 0),
            self.sample(sample_idx, 1),
            self.sample(sample_idx, 2),
        )
    }
}

/// Deterministic uniform value in `[0, 1)` keyed by `(seed, idx, stream)`.
#[inline]
pub fn uniform(seed: u64, idx: usize, stream: usize) -> Real {
    u64_to_unit_f64(splitmix64(mix_key(seed, idx, stream)))
}

/// Deterministic unit vector, uniformly distributed over the sphere.
pub fn unit_vector(seed: u64, idx: usize) -> Vec3 {
    let z = 2.0 * uniform(seed, idx, 0) - 1.0;
    let phi = 2.0 * std::f64::consts::PI * uniform(seed, idx, 1);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

#[inline]
fn mix_key(seed: u64, sample_idx: usize, axis: usize) -> u64 {
    // SplitMix64 stream selection via a stable integer mix.
    seed ^ (sample_idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (axis as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn u64_to_unit_f64(x: u64) -> Real {
    // Top 53 bits as a double in [0, 1).
    let mantissa = x >> 11;
    (mantissa as Real) * (1.0 / ((1u64 << 53) as Real))
}
