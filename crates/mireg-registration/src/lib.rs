//! Multi-resolution non-rigid registration.
//!
//! A [`RegistrationDriver`] walks a resolution pyramid from coarse to fine.
//! On every level a [`CostAggregator`] evaluates the weighted cost terms for
//! the current transformation, a [`Minimizer`] updates the parameters, and for
//! dense displacement fields a [`VectorFieldRegularizer`] smooths the force.
//! Components are created from plugin strings through a [`PluginRegistry`].

pub mod cancel;
pub mod config;
pub mod convergence;
pub mod cost;
pub mod driver;
pub mod error;
pub mod minimizer;
pub mod problem;
pub mod progress;
pub mod registry;
pub mod regularizer;
pub mod validation;

pub use cancel::CancellationToken;
pub use config::{
    GdasConfig, LbfgsConfig, LevelConfig, PyramidConfig, RegistrationConfig, RegularizerModel, SorConfig,
};
pub use convergence::ConvergenceTracker;
pub use cost::{CostAggregator, CostTerm, CostTermFactory, NccCost, NccFactory, SsdCost, SsdFactory};
pub use driver::{penalty_scale, step_scale, DriverState, LevelReport, RegistrationDriver, RegistrationOutcome};
pub use error::{RegistrationError, Result};
pub use minimizer::{Gdas, Lbfgs, Minimizer, MinimizerReport, MinimizerStatus, Problem, StepControl, StepMonitor};
pub use problem::{LevelProblem, RegularizedProblem};
pub use progress::{ConsoleProgressCallback, HistoryCallback, ProgressCallback, ProgressInfo, ProgressTracker};
pub use registry::{PluginRegistry, PluginSpec};
pub use regularizer::{NavierSor, SorReport, SorStatus, VectorFieldRegularizer};
