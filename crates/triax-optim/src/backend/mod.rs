//! Solver backends implementing [`crate::NllsSolverBackend`].

mod lm;

pub use lm::LmBackend;
