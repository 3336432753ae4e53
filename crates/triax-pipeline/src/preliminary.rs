//! Candidate solver driving the robust loop.
//!
//! Each drawn subset is copied into a reused scratch buffer and fitted
//! either in closed form ([`LinearFit`]) or by Levenberg–Marquardt from the
//! configured initial guess, optionally followed by a refinement on the same
//! subset. Any failure marks the subset as degenerate.

use crate::CalibrationConfig;
use log::trace;
use triax_core::{CalibrationParams, CandidateSolver, ParamMask, Real};
use triax_linear::LinearFit;
use triax_optim::refine;

pub struct PreliminarySolver<'a, M: LinearFit> {
    model: M,
    measurements: &'a [M::Measurement],
    config: CalibrationConfig,
    subset_size: usize,
    scratch: Vec<M::Measurement>,
}

impl<'a, M: LinearFit> PreliminarySolver<'a, M> {
    pub fn new(model: M, measurements: &'a [M::Measurement], config: CalibrationConfig) -> Self {
        let subset_size =
            config.effective_subset_size(model.min_measurements(config.common_axis));
        Self {
            model,
            measurements,
            config,
            subset_size,
            scratch: Vec::with_capacity(subset_size),
        }
    }

    fn fit(&self) -> Option<CalibrationParams> {
        let common_axis = self.config.common_axis;
        let params = if self.config.linear_preliminary {
            self.model
                .linear_fit(&self.scratch, common_axis)
                .inspect_err(|e| trace!("linear fit rejected subset: {e}"))
                .ok()?
        } else {
            let mut initial = self.config.initial_guess.unwrap_or_default();
            if self.model.param_mask(common_axis) == ParamMask::common_axis() {
                initial = initial.with_common_axis();
            }
            refine(&self.model, &self.scratch, &initial, common_axis, &self.config.solve)
                .inspect_err(|e| trace!("non-linear fit rejected subset: {e}"))
                .ok()?
                .params
        };

        if !self.config.refine_preliminary {
            return Some(params);
        }
        match refine(&self.model, &self.scratch, &params, common_axis, &self.config.solve) {
            Ok(refined) => Some(refined.params),
            Err(e) => {
                trace!("preliminary refinement failed, keeping fit: {e}");
                Some(params)
            }
        }
    }
}

impl<M: LinearFit> CandidateSolver for PreliminarySolver<'_, M> {
    type Candidate = CalibrationParams;

    fn num_measurements(&self) -> usize {
        self.measurements.len()
    }

    fn subset_size(&self) -> usize {
        self.subset_size
    }

    fn solve(&mut self, subset: &[usize]) -> Option<CalibrationParams> {
        self.scratch.clear();
        self.scratch
            .extend(subset.iter().map(|&i| self.measurements[i].clone()));
        self.fit().filter(CalibrationParams::is_finite)
    }

    fn residuals(&self, candidate: &CalibrationParams, out: &mut Vec<Real>) {
        out.extend(self.measurements.iter().map(|m| {
            let r = self.model.residual_norm(candidate, m);
            if r.is_nan() { Real::INFINITY } else { r }
        }));
    }
}
