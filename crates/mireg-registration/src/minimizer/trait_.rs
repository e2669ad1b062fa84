//! Minimizer trait and the oracle it consumes.
//!
//! Every minimizer works on a plain parameter vector, so implementations are
//! interchangeable: the driver only sees a [`MinimizerReport`].

use std::fmt::Debug;
use crate::error::{RegistrationError, Result};

/// Value and gradient oracle of an optimization problem.
pub trait Problem {
    /// Number of parameters.
    fn size(&self) -> usize;

    /// Cost at `x`.
    fn value(&mut self, x: &[f64]) -> Result<f64>;

    /// Cost at `x`; the gradient is written into `gradient`.
    fn value_and_gradient(&mut self, x: &[f64], gradient: &mut [f64]) -> Result<f64>;
}

/// What a [`StepMonitor`] asks the minimizer to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
    Continue,
    /// The caller considers the problem converged.
    Stop,
    /// The caller wants the minimizer to return immediately.
    Interrupt,
}

/// Observer of accepted steps.
pub trait StepMonitor {
    fn on_step(&mut self, iteration: usize, value: f64) -> StepControl;
}

/// Monitor that never intervenes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unmonitored;

impl StepMonitor for Unmonitored {
    fn on_step(&mut self, _iteration: usize, _value: f64) -> StepControl {
        StepControl::Continue
    }
}

impl<F: FnMut(usize, f64) -> StepControl> StepMonitor for F {
    fn on_step(&mut self, iteration: usize, value: f64) -> StepControl {
        self(iteration, value)
    }
}

/// Why a minimizer returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimizerStatus {
    Converged,
    IterationLimit,
    /// No improving step within the allowed number of reductions.
    LineSearchFailed,
    Interrupted,
}

/// Outcome of one [`Minimizer::minimize`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizerReport {
    pub status: MinimizerStatus,
    /// Iterations (trial steps) performed.
    pub iterations: usize,
    /// Oracle evaluations.
    pub evaluations: usize,
    pub initial_value: f64,
    /// Value at the returned parameters.
    pub final_value: f64,
}

/// Generic iterative minimizer.
///
/// On return `x` holds the best point accepted; accepted values never increase.
pub trait Minimizer: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Minimize `problem` starting from `x`.
    fn minimize(
        &self,
        problem: &mut dyn Problem,
        x: &mut [f64],
        monitor: &mut dyn StepMonitor,
    ) -> Result<MinimizerReport>;

    /// A copy whose step sizes are multiplied by `step_scale`.
    fn scaled(&self, step_scale: f64) -> Box<dyn Minimizer>;
}

pub(crate) fn check_size(problem: &dyn Problem, x: &[f64]) -> Result<()> {
    if problem.size() != x.len() {
        return Err(RegistrationError::configuration(format!(
            "problem has {} parameters, start vector has {}",
            problem.size(),
            x.len()
        )));
    }
    Ok(())
}

pub(crate) fn ensure_finite(value: f64, what: &str) -> Result<f64> {
    if !value.is_finite() {
        return Err(RegistrationError::contract_violation(format!(
            "{what} produced a non-finite cost"
        )));
    }
    Ok(value)
}

pub(crate) fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
