//! PDE-based smoothing of force fields for the dense transformation family.

mod navier;

pub use navier::NavierSor;

use std::fmt::Debug;
use mireg_core::VectorField;
use crate::error::Result;

/// How a relaxation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SorStatus {
    /// The per-sweep change fell below the tolerance.
    Converged,
    /// The sweep budget was exhausted first.
    IterationLimit,
}

/// Diagnostics of one [`VectorFieldRegularizer::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SorReport {
    pub status: SorStatus,
    /// Sweeps performed.
    pub iterations: usize,
    /// Largest per-point change of the last sweep.
    pub residual: f64,
}

/// Turns a raw force field into a smooth displacement update.
pub trait VectorFieldRegularizer<const D: usize>: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Solve for the regularized field driven by `force`.
    ///
    /// Fails with [`crate::error::RegistrationError::NonConvergence`] if the
    /// relaxation diverges.
    fn run(&mut self, force: &VectorField<D>) -> Result<SorReport>;

    /// Solution of the last successful [`VectorFieldRegularizer::run`].
    fn solution(&self) -> Option<&VectorField<D>>;

    /// Forget any retained solution (e.g. between pyramid levels).
    fn reset(&mut self);

    fn clone_box(&self) -> Box<dyn VectorFieldRegularizer<D>>;
}

impl<const D: usize> Clone for Box<dyn VectorFieldRegularizer<D>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
