use super::ransac::{count_is_better, count_score};
use super::{RobustMethod, Sampling, Score, ScoringStrategy};
use crate::Real;

/// Progressive sample consensus.
///
/// Scores like [`super::Ransac`] but draws subsets from a window over the
/// measurements sorted by descending quality score, widened progressively
/// (see [`super::ProsacSampler`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct Prosac;

impl ScoringStrategy for Prosac {
    fn method(&self) -> RobustMethod {
        RobustMethod::Prosac
    }

    fn sampling(&self) -> Sampling {
        Sampling::QualityRanked
    }

    fn score(&self, residuals: &[Real], threshold: Real, _subset_size: usize) -> Score {
        count_score(residuals, threshold)
    }

    fn is_better(&self, candidate: &Score, best: &Score) -> bool {
        count_is_better(candidate, best)
    }
}
