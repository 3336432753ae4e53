//! Subset samplers.

use super::{RobustError, Sampling};
use crate::Real;
use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;

/// PROSAC progressive sampler (Chum & Matas, 2005).
///
/// Measurements are ranked by descending quality score. Subsets are drawn
/// from the top-`n` window, which grows according to the growth function
/// `T_n`; while the window is still growing every subset contains the
/// newest (lowest-ranked) element of the window. Once the window covers all
/// measurements, sampling degenerates to uniform RANSAC sampling.
#[derive(Debug, Clone)]
pub struct ProsacSampler {
    /// Measurement indices sorted by descending quality.
    order: Vec<usize>,
    subset_size: usize,
    /// Current window size.
    n: usize,
    /// Number of subsets drawn so far.
    t: usize,
    t_n: Real,
    t_n_prime: Real,
}

impl ProsacSampler {
    /// Build a sampler from per-measurement quality scores.
    ///
    /// `max_iterations` scales the growth function (`T_N` in the paper).
    pub fn new(quality_scores: &[Real], subset_size: usize, max_iterations: usize) -> Self {
        let mut order: Vec<usize> = (0..quality_scores.len()).collect();
        order.sort_by(|&a, &b| quality_scores[b].total_cmp(&quality_scores[a]));

        let total = order.len();
        let mut t_n = max_iterations as Real;
        for i in 0..subset_size.min(total) {
            t_n *= (subset_size - i) as Real / (total - i) as Real;
        }

        Self {
            order,
            subset_size,
            n: subset_size.min(total),
            t: 0,
            t_n,
            t_n_prime: 1.0,
        }
    }

    /// Current size of the sampling window.
    pub fn window(&self) -> usize {
        self.n
    }

    /// Measurement indices sorted by descending quality.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Draw the next subset into `out`.
    pub fn draw(&mut self, rng: &mut StdRng, out: &mut Vec<usize>) {
        let total = self.order.len();
        let k = self.subset_size;
        self.t += 1;

        // too few measurements for a proper subset: hand out all of them
        if k == 0 || total < k {
            out.clear();
            out.extend_from_slice(&self.order);
            return;
        }

        if self.t as Real > self.t_n_prime && self.n < total {
            let t_next = self.t_n * (self.n + 1) as Real / (self.n + 1 - k) as Real;
            self.n += 1;
            self.t_n_prime += (t_next - self.t_n).ceil();
            self.t_n = t_next;
        }

        out.clear();
        if self.t_n_prime < self.t as Real {
            out.extend(self.order[..self.n].choose_multiple(rng, k).copied());
        } else {
            out.extend(self.order[..self.n - 1].choose_multiple(rng, k - 1).copied());
            out.push(self.order[self.n - 1]);
        }
    }
}

/// Sampler selected from a strategy's [`Sampling`] order.
#[derive(Debug, Clone)]
pub(crate) enum SubsetSampler {
    Uniform { indices: Vec<usize>, subset_size: usize },
    Prosac(ProsacSampler),
}

impl SubsetSampler {
    pub fn new(
        sampling: Sampling,
        num_measurements: usize,
        subset_size: usize,
        quality_scores: Option<&[Real]>,
        max_iterations: usize,
    ) -> Result<Self, RobustError> {
        match sampling {
            Sampling::Uniform => Ok(Self::Uniform {
                indices: (0..num_measurements).collect(),
                subset_size,
            }),
            Sampling::QualityRanked => {
                let scores = quality_scores.ok_or(RobustError::MissingQualityScores)?;
                if scores.len() != num_measurements {
                    return Err(RobustError::QualityScoresLength {
                        expected: num_measurements,
                        got: scores.len(),
                    });
                }
                Ok(Self::Prosac(ProsacSampler::new(
                    scores,
                    subset_size,
                    max_iterations,
                )))
            }
        }
    }

    pub fn draw(&mut self, rng: &mut StdRng, out: &mut Vec<usize>) {
        match self {
            Self::Uniform {
                indices,
                subset_size,
            } => {
                out.clear();
                out.extend(indices.as_slice().choose_multiple(rng, *subset_size).copied());
            }
            Self::Prosac(sampler) => sampler.draw(rng, out),
        }
    }
}
