use super::CalibrationSession;
use triax_linear::LinearFit;

/// Receives synchronous notifications from
/// [`CalibrationSession::calibrate`].
///
/// Every method gets mutable access to the running session. The session is
/// in [`super::SessionState::Running`] for the whole call, so any mutator
/// (and a nested `calibrate()`) returns [`crate::CalibrationError::Locked`].
/// Read accessors remain available.
pub trait CalibrationListener<M: LinearFit> {
    /// First observable action of `calibrate()`.
    fn on_calibrate_start(&mut self, _session: &mut CalibrationSession<M>) {}

    /// Last observable action of `calibrate()`, on success and on failure.
    fn on_calibrate_end(&mut self, _session: &mut CalibrationSession<M>) {}

    /// After every scored iteration of the robust loop (1-based).
    fn on_iteration(&mut self, _session: &mut CalibrationSession<M>, _iteration: usize) {}

    /// Whenever progress advanced by at least the configured delta.
    fn on_progress(&mut self, _session: &mut CalibrationSession<M>, _progress: f32) {}
}
