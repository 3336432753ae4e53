//! Generic, model-agnostic robust estimation engine.
//!
//! To use this module, implement [`CandidateSolver`] for your problem, pick a
//! [`ScoringStrategy`] (usually through [`RobustMethod::strategy`]) and call
//! [`estimate`] with some [`RobustOptions`].
//!
//! The loop repeatedly draws a measurement subset, builds a candidate from
//! it, scores the candidate against every measurement and keeps the best
//! one. The iteration bound shrinks as better candidates are found:
//!
//! ```text
//! iterations = ceil(log(1 - confidence) / log(1 - w^k))
//! ```
//!
//! where `w` is the inlier ratio of the best candidate and `k` the subset
//! size. Degenerate subsets are redrawn in place and do not count as
//! iterations.

use crate::Real;
use log::{debug, warn};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod lmeds;
mod msac;
mod promeds;
mod prosac;
mod ransac;
mod sampler;
mod strategy;

pub use lmeds::Lmeds;
pub use msac::Msac;
pub use promeds::Promeds;
pub use prosac::Prosac;
pub use ransac::Ransac;
pub use sampler::ProsacSampler;
pub use strategy::{RobustMethod, Sampling, Score, ScoringStrategy};

use sampler::SubsetSampler;

/// Upper bound on degenerate subsets, as a multiple of the iteration limit.
pub const DEGENERATE_RETRY_FACTOR: usize = 10;

/// Configuration parameters for the robust estimation loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustOptions {
    /// Residual threshold in measurement units.
    ///
    /// Inlier threshold for RANSAC, MSAC and PROSAC; stop threshold and
    /// inlier-threshold floor for LMedS and PROMedS.
    pub threshold: Real,
    /// Desired probability in `(0, 1)` of drawing at least one outlier-free subset.
    pub confidence: Real,
    /// Maximum number of scored iterations.
    pub max_iterations: usize,
    /// Minimum progress increment in `(0, 1]` between progress notifications.
    pub progress_delta: f32,
    /// Random-number generator seed (for reproducibility).
    pub seed: u64,
}

impl Default for RobustOptions {
    fn default() -> Self {
        Self {
            threshold: 1e-2,
            confidence: 0.99,
            max_iterations: 5000,
            progress_delta: 0.05,
            seed: 1_234_567,
        }
    }
}

impl RobustOptions {
    /// Check every field against its valid range.
    pub fn validate(&self) -> Result<(), RobustError> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(RobustError::InvalidOptions("threshold must be positive"));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(RobustError::InvalidOptions(
                "confidence must lie in the open interval (0, 1)",
            ));
        }
        if self.max_iterations == 0 {
            return Err(RobustError::InvalidOptions(
                "max iterations must be positive",
            ));
        }
        if !(self.progress_delta > 0.0 && self.progress_delta <= 1.0) {
            return Err(RobustError::InvalidOptions(
                "progress delta must lie in (0, 1]",
            ));
        }
        Ok(())
    }
}

/// Errors reported by [`estimate`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RobustError {
    #[error("need at least {needed} measurements, got {got}")]
    NotEnoughData { needed: usize, got: usize },
    #[error("quality scores are required by the selected method")]
    MissingQualityScores,
    #[error("expected {expected} quality scores, got {got}")]
    QualityScoresLength { expected: usize, got: usize },
    #[error("invalid robust options: {0}")]
    InvalidOptions(&'static str),
    #[error("no candidate could be scored ({iterations} iterations, {degenerate} degenerate subsets)")]
    EstimationFailed { iterations: usize, degenerate: usize },
}

/// Problem-specific half of the robust loop.
pub trait CandidateSolver {
    type Candidate;

    /// Total number of measurements.
    fn num_measurements(&self) -> usize;

    /// Number of measurements per subset.
    fn subset_size(&self) -> usize;

    /// Build a candidate from the measurements at `subset`.
    ///
    /// Return `None` if the subset is degenerate or fitting fails.
    fn solve(&mut self, subset: &[usize]) -> Option<Self::Candidate>;

    /// Write the residual of every measurement for `candidate` into `out`.
    ///
    /// Residuals must be non-negative and in the same units as
    /// [`RobustOptions::threshold`].
    fn residuals(&self, candidate: &Self::Candidate, out: &mut Vec<Real>);
}

/// Receives loop notifications. Both methods are called synchronously.
pub trait RobustObserver {
    fn on_iteration(&mut self, _iteration: usize) {}
    fn on_progress(&mut self, _progress: f32) {}
}

/// Observer ignoring all notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RobustObserver for NoopObserver {}

/// Inlier classification of the winning candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InliersData {
    /// Per-measurement inlier flag.
    pub inliers: Vec<bool>,
    /// Per-measurement residual used for classification.
    pub residuals: Vec<Real>,
    pub num_inliers: usize,
    /// Estimated fraction of outliers.
    pub outlier_ratio: Real,
    /// Threshold applied to the residuals.
    pub threshold: Real,
}

impl InliersData {
    pub fn from_residuals(residuals: Vec<Real>, threshold: Real) -> Self {
        let inliers: Vec<bool> = residuals.iter().map(|&r| r <= threshold).collect();
        let num_inliers = inliers.iter().filter(|f| **f).count();
        let outlier_ratio = if residuals.is_empty() {
            0.0
        } else {
            1.0 - num_inliers as Real / residuals.len() as Real
        };
        Self {
            inliers,
            residuals,
            num_inliers,
            outlier_ratio,
            threshold,
        }
    }

    /// Indices of the inlier measurements.
    pub fn inlier_indices(&self) -> Vec<usize> {
        self.inliers
            .iter()
            .enumerate()
            .filter_map(|(i, &f)| f.then_some(i))
            .collect()
    }
}

/// Output of a successful robust run.
#[derive(Debug, Clone)]
pub struct RobustOutcome<C> {
    /// Best candidate found.
    pub candidate: C,
    pub score: Score,
    pub inliers: InliersData,
    /// Number of scored iterations performed.
    pub iterations: usize,
}

/// Dynamic iteration bound from the current inlier ratio.
///
/// Floored at 1 and capped at `max_iterations`.
pub fn required_iterations(
    confidence: Real,
    inlier_ratio: Real,
    subset_size: usize,
    max_iterations: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iterations;
    }
    if inlier_ratio >= 1.0 {
        return 1.min(max_iterations);
    }

    let denom = (1.0 - inlier_ratio.powi(subset_size as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iterations;
    }

    let n_iter = ((1.0 - confidence).ln() / denom).ceil();
    if !n_iter.is_finite() || n_iter >= max_iterations as Real {
        return max_iterations;
    }
    (n_iter as usize).clamp(1, max_iterations)
}

/// Run the robust estimation loop.
///
/// `quality_scores` is only consulted by strategies with
/// [`Sampling::QualityRanked`]; it must then hold one score per measurement.
pub fn estimate<S: CandidateSolver>(
    solver: &mut S,
    strategy: &dyn ScoringStrategy,
    quality_scores: Option<&[Real]>,
    opts: &RobustOptions,
    observer: &mut dyn RobustObserver,
) -> Result<RobustOutcome<S::Candidate>, RobustError> {
    opts.validate()?;

    let n = solver.num_measurements();
    let k = solver.subset_size();
    if k == 0 || n < k {
        return Err(RobustError::NotEnoughData { needed: k, got: n });
    }

    let mut sampler = SubsetSampler::new(
        strategy.sampling(),
        n,
        k,
        quality_scores,
        opts.max_iterations,
    )?;
    let mut rng = StdRng::seed_from_u64(opts.seed);

    let mut subset = Vec::with_capacity(k);
    let mut residuals = Vec::with_capacity(n);
    let mut best_residuals = Vec::with_capacity(n);
    let mut best: Option<(S::Candidate, Score)> = None;

    let max_degenerate = opts.max_iterations.saturating_mul(DEGENERATE_RETRY_FACTOR);
    let mut degenerate = 0usize;
    let mut bound = opts.max_iterations;
    let mut iteration = 0usize;
    let mut last_progress = 0.0f32;

    'search: while iteration < bound {
        let candidate = loop {
            sampler.draw(&mut rng, &mut subset);
            if let Some(candidate) = solver.solve(&subset) {
                break candidate;
            }
            degenerate += 1;
            if degenerate >= max_degenerate {
                warn!(
                    "{}: giving up after {} degenerate subsets",
                    strategy.method(),
                    degenerate
                );
                break 'search;
            }
        };

        residuals.clear();
        solver.residuals(&candidate, &mut residuals);
        let score = strategy.score(&residuals, opts.threshold, k);
        iteration += 1;
        observer.on_iteration(iteration);

        let improved = match &best {
            None => true,
            Some((_, best_score)) => strategy.is_better(&score, best_score),
        };
        if improved {
            // Median-based scores widen their inlier threshold with the
            // residual spread, so the bound only trusts the configured one.
            let confirmed = residuals
                .iter()
                .filter(|r| **r <= opts.threshold)
                .count()
                .min(score.inlier_count);
            let inlier_ratio = confirmed as Real / n as Real;
            bound = bound.min(required_iterations(
                opts.confidence,
                inlier_ratio,
                k,
                opts.max_iterations,
            ));
            debug!(
                "{}: iteration {} improved score to {:.6e} ({} inliers), bound {}",
                strategy.method(),
                iteration,
                score.value,
                score.inlier_count,
                bound
            );
            std::mem::swap(&mut residuals, &mut best_residuals);
            best = Some((candidate, score));
        }

        let progress = (iteration as f32 / bound.max(1) as f32).min(1.0);
        if progress - last_progress >= opts.progress_delta {
            last_progress = progress;
            observer.on_progress(progress);
        }

        if let Some((_, best_score)) = &best {
            if strategy.should_stop(best_score, opts.threshold) {
                debug!("{}: stop threshold reached at iteration {}", strategy.method(), iteration);
                break;
            }
        }
    }

    let Some((candidate, score)) = best else {
        return Err(RobustError::EstimationFailed {
            iterations: iteration,
            degenerate,
        });
    };

    let inliers = InliersData::from_residuals(best_residuals, score.inlier_threshold);
    Ok(RobustOutcome {
        candidate,
        score,
        inliers,
        iterations: iteration,
    })
}
