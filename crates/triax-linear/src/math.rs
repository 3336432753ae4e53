//! Least-squares helpers shared by the closed-form fits.

use nalgebra::{DMatrix, DVector};
use triax_core::Real;

/// Relative singular-value tolerance below which a system is rank deficient.
pub const RANK_TOLERANCE: Real = 1e-10;

/// Solve `a x = b` in the least-squares sense.
///
/// Columns are equilibrated to unit norm before the SVD so that the rank
/// test is insensitive to the units of the unknowns. Returns `None` if the
/// system is under-determined, has a zero column, or its smallest singular
/// value falls below `RANK_TOLERANCE` times the largest.
pub fn solve_least_squares(a: &DMatrix<Real>, b: &DVector<Real>) -> Option<DVector<Real>> {
    let (rows, cols) = a.shape();
    if rows < cols || cols == 0 || b.len() != rows {
        return None;
    }

    let scales: Vec<Real> = a.column_iter().map(|c| c.norm()).collect();
    if scales.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
        return None;
    }
    let mut scaled = a.clone();
    for (j, s) in scales.iter().enumerate() {
        scaled.column_mut(j).unscale_mut(*s);
    }

    let svd = scaled.svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    if !s_max.is_finite() || s_min <= RANK_TOLERANCE * s_max {
        return None;
    }

    let mut x = svd.solve(b, 0.0).ok()?;
    for (j, s) in scales.iter().enumerate() {
        x[j] /= s;
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Unit vector spanning the one-dimensional null space of `a`.
///
/// Solves the homogeneous system `a x = 0` in the least-squares sense: the
/// right singular vector of the smallest singular value, after the same
/// column equilibration as [`solve_least_squares`]. `a` is padded with zero
/// rows when it has fewer rows than columns. Returns `None` if a column is
/// zero or the null space has more than one dimension (the second-smallest
/// singular value falls below `RANK_TOLERANCE` times the largest).
pub fn null_vector(a: &DMatrix<Real>) -> Option<DVector<Real>> {
    let (rows, cols) = a.shape();
    if cols < 2 {
        return None;
    }

    let scales: Vec<Real> = a.column_iter().map(|c| c.norm()).collect();
    if scales.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
        return None;
    }
    let mut scaled = DMatrix::<Real>::zeros(rows.max(cols), cols);
    scaled.view_mut((0, 0), (rows, cols)).copy_from(a);
    for (j, s) in scales.iter().enumerate() {
        scaled.column_mut(j).unscale_mut(*s);
    }

    let svd = scaled.svd(false, true);
    let v_t = svd.v_t?;
    let sv = &svd.singular_values;
    let mut order: Vec<usize> = (0..sv.len()).collect();
    order.sort_by(|&i, &j| sv[i].total_cmp(&sv[j]));
    let s_max = sv[order[order.len() - 1]];
    if !(s_max.is_finite() && s_max > 0.0) || sv[order[1]] <= RANK_TOLERANCE * s_max {
        return None;
    }

    let mut x = v_t.row(order[0]).transpose();
    for (j, s) in scales.iter().enumerate() {
        x[j] /= s;
    }
    let norm = x.norm();
    (norm.is_finite() && norm > 0.0).then(|| x / norm)
}
