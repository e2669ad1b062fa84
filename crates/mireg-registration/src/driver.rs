//! Coarse-to-fine registration driver.
//!
//! Orchestrates the registration over a resolution pyramid. At every level
//! the transformation of the previous level is upscaled, a fresh cost
//! aggregator is bound to the level's reference, and the minimizer runs until
//! the convergence tracker fires or the level's budget is exhausted.

use std::fmt;
use std::sync::Arc;
use burn::tensor::backend::Backend;
use mireg_core::filter::{JointStatistics, MultiResolutionPyramid};
use mireg_core::{Image, ScalarField, Transformation, TransformationFactory};
use crate::cancel::CancellationToken;
use crate::config::RegistrationConfig;
use crate::convergence::ConvergenceTracker;
use crate::cost::{CostAggregator, CostTermFactory};
use crate::error::{RegistrationError, Result};
use crate::minimizer::{Minimizer, MinimizerReport, MinimizerStatus, StepControl, StepMonitor};
use crate::problem::{LevelProblem, RegularizedProblem};
use crate::progress::ProgressTracker;
use crate::regularizer::VectorFieldRegularizer;
use crate::validation::{validate_image_sizes, validate_registration};

/// Weight of an energy penalty of derivative `order` at a level whose
/// spacing is `ratio` times the finest spacing: `ratio^(2 - 2 order)`.
pub fn penalty_scale(order: usize, ratio: f64) -> f64 {
    if order <= 1 {
        1.0
    } else {
        ratio.powi(2 - 2 * order as i32)
    }
}

/// Factor on the minimizer's step sizes at a level whose spacing is `ratio`
/// times the finest spacing.
pub fn step_scale(ratio: f64) -> f64 {
    1.0 / ratio
}

/// States of the level state machine, recorded in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Init,
    LevelSetup(usize),
    Optimizing(usize),
    LevelConverged(usize),
    Done,
}

/// Diagnostics of one pyramid level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelReport {
    /// 0 is the coarsest level.
    pub level: usize,
    pub size: Vec<usize>,
    /// Status of the last minimizer run on this level.
    pub status: MinimizerStatus,
    /// Accepted steps over all minimizer runs of the level.
    pub iterations: usize,
    pub evaluations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    /// The convergence tracker fired.
    pub converged: bool,
    /// The budget ran out or the line search failed before convergence.
    pub iteration_limited: bool,
    /// Set if the regularizer diverged, in which case the best parameters
    /// seen were kept, or if some relaxation stopped at its sweep budget.
    pub sor_non_convergence: Option<String>,
}

/// Result of [`RegistrationDriver::run`].
#[derive(Debug)]
pub struct RegistrationOutcome<const D: usize> {
    /// Transformation on the finest grid.
    pub transformation: Box<dyn Transformation<D>>,
    pub levels: Vec<LevelReport>,
    pub final_cost: f64,
    pub state_trace: Vec<DriverState>,
    /// Both images were constant; the identity was returned without optimizing.
    pub identity_shortcut: bool,
}

impl<const D: usize> RegistrationOutcome<D> {
    /// Resample `floating` with the final transformation.
    pub fn warp<B: Backend>(&self, floating: &Image<B, D>) -> Result<Image<B, D>> {
        let field = ScalarField::from_image(floating)?;
        let warped = self.transformation.apply(&field)?;
        Ok(warped.to_image(*floating.origin(), *floating.spacing(), &floating.data().device()))
    }

    /// True if any level needed a fallback.
    pub fn has_warnings(&self) -> bool {
        self.levels
            .iter()
            .any(|l| l.iteration_limited || l.sor_non_convergence.is_some())
    }
}

/// Observes accepted steps of one level.
struct LevelMonitor<'a> {
    level: usize,
    budget: usize,
    steps: usize,
    tracker: ConvergenceTracker,
    progress: &'a ProgressTracker,
    cancellation: Option<&'a CancellationToken>,
    budget_exhausted: bool,
    cancelled: bool,
}

impl LevelMonitor<'_> {
    fn restart(&mut self) {
        self.steps = 0;
        self.tracker.reset();
        self.budget_exhausted = false;
    }
}

impl StepMonitor for LevelMonitor<'_> {
    fn on_step(&mut self, _iteration: usize, value: f64) -> StepControl {
        self.steps += 1;
        self.progress.update(self.level, self.steps, Some(self.budget), value);
        if self.cancellation.is_some_and(CancellationToken::is_cancelled) {
            self.cancelled = true;
            return StepControl::Interrupt;
        }
        if self.tracker.push(value) {
            return StepControl::Stop;
        }
        if self.steps >= self.budget {
            self.budget_exhausted = true;
            return StepControl::Stop;
        }
        StepControl::Continue
    }
}

/// Multi-resolution registration driver.
///
/// Components are passed in explicitly (usually created by a
/// [`crate::registry::PluginRegistry`]).
pub struct RegistrationDriver<const D: usize> {
    config: RegistrationConfig,
    costs: Vec<Arc<dyn CostTermFactory<D>>>,
    transformation: Arc<dyn TransformationFactory<D>>,
    minimizer: Box<dyn Minimizer>,
    refinement: Option<Box<dyn Minimizer>>,
    regularizer: Option<Box<dyn VectorFieldRegularizer<D>>>,
    cancellation: Option<CancellationToken>,
    progress: ProgressTracker,
}

impl<const D: usize> fmt::Debug for RegistrationDriver<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationDriver")
            .field("config", &self.config)
            .field("costs", &self.costs)
            .field("transformation", &self.transformation)
            .field("minimizer", &self.minimizer)
            .field("refinement", &self.refinement)
            .field("regularizer", &self.regularizer)
            .finish_non_exhaustive()
    }
}

impl<const D: usize> RegistrationDriver<D> {
    pub fn new(
        config: RegistrationConfig,
        transformation: Arc<dyn TransformationFactory<D>>,
        minimizer: Box<dyn Minimizer>,
    ) -> Self {
        Self {
            config,
            costs: Vec::new(),
            transformation,
            minimizer,
            refinement: None,
            regularizer: None,
            cancellation: None,
            progress: ProgressTracker::new(),
        }
    }

    pub fn with_cost(mut self, cost: Arc<dyn CostTermFactory<D>>) -> Self {
        self.costs.push(cost);
        self
    }

    pub fn with_costs(mut self, costs: impl IntoIterator<Item = Arc<dyn CostTermFactory<D>>>) -> Self {
        self.costs.extend(costs);
        self
    }

    /// Minimizer run after the main one on every level.
    pub fn with_refinement(mut self, minimizer: Box<dyn Minimizer>) -> Self {
        self.refinement = Some(minimizer);
        self
    }

    /// Regularizer for the dense transformation family.
    pub fn with_regularizer(mut self, regularizer: Box<dyn VectorFieldRegularizer<D>>) -> Self {
        self.regularizer = Some(regularizer);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Checks that need no image data.
    fn validate(&self, size: [usize; D]) -> Result<Box<dyn Transformation<D>>> {
        validate_registration(&self.config)?;
        if self.costs.is_empty() {
            return Err(RegistrationError::configuration("no cost terms given"));
        }
        let identity = self
            .transformation
            .identity(size)
            .map_err(|e| RegistrationError::configuration(e.to_string()))?;
        if self.regularizer.is_some() && !identity.is_dense() {
            return Err(RegistrationError::configuration(format!(
                "a vector field regularizer needs a dense transformation, got '{}'",
                identity.name()
            )));
        }
        Ok(identity)
    }

    /// Register `floating` onto `reference`.
    pub fn run<B: Backend>(
        &self,
        floating: &Image<B, D>,
        reference: &Image<B, D>,
    ) -> Result<RegistrationOutcome<D>> {
        self.progress.start();
        let result = self.execute(floating, reference);
        match &result {
            Ok(outcome) => self.progress.complete(outcome.levels.len().saturating_sub(1), outcome.final_cost),
            Err(e) => self.progress.error(&e.to_string()),
        }
        result
    }

    fn execute<B: Backend>(
        &self,
        floating: &Image<B, D>,
        reference: &Image<B, D>,
    ) -> Result<RegistrationOutcome<D>> {
        let mut state_trace = vec![DriverState::Init];
        validate_image_sizes(floating.shape(), reference.shape())?;
        let identity = self.validate(reference.shape())?;
        if self.is_cancelled() {
            return Err(RegistrationError::Cancelled);
        }

        let stats = JointStatistics::compute(&[floating, reference]);
        if stats.is_degenerate() {
            tracing::info!(mean = stats.mean, "both images are constant, returning the identity");
            let reference_field = Arc::new(ScalarField::from_image(reference)?);
            let floating_field = ScalarField::from_image(floating)?;
            let costs = CostAggregator::from_factories(&self.costs, reference_field)?;
            let interpolator = identity.resampling().interpolator(&floating_field);
            let final_cost = costs.value(identity.as_ref(), interpolator.as_ref())?;
            state_trace.push(DriverState::Done);
            return Ok(RegistrationOutcome {
                transformation: identity,
                levels: Vec::new(),
                final_cost,
                state_trace,
                identity_shortcut: true,
            });
        }
        let (floating, reference) = if self.config.normalize_intensities {
            (stats.normalize(floating), stats.normalize(reference))
        } else {
            (floating.clone(), reference.clone())
        };

        let pyramid = &self.config.pyramid;
        let floating_pyramid = MultiResolutionPyramid::new(
            &floating,
            pyramid.levels,
            pyramid.min_level_size,
            pyramid.smoothing_sigma,
        );
        let reference_pyramid = MultiResolutionPyramid::new(
            &reference,
            pyramid.levels,
            pyramid.min_level_size,
            pyramid.smoothing_sigma,
        );
        let level_count = reference_pyramid.levels();
        tracing::info!(levels = level_count, size = ?reference.shape(), "registration started");

        let mut current: Option<Box<dyn Transformation<D>>> = None;
        let mut levels = Vec::with_capacity(level_count);
        for level in 0..level_count {
            if self.is_cancelled() {
                tracing::info!(level, "registration cancelled");
                return Err(RegistrationError::Cancelled);
            }
            let (Some(floating_level), Some(reference_level)) =
                (floating_pyramid.get_level(level), reference_pyramid.get_level(level))
            else {
                return Err(RegistrationError::contract_violation(format!(
                    "pyramid level {level} is missing"
                )));
            };

            state_trace.push(DriverState::LevelSetup(level));
            let ratio = reference_pyramid.scale_factor(level);
            let (transformation, report) = self.run_level(
                level,
                ratio,
                floating_level,
                reference_level,
                current.take(),
                &mut state_trace,
            )?;
            state_trace.push(DriverState::LevelConverged(level));
            self.progress.level_complete(level, report.final_cost);
            levels.push(report);
            current = Some(transformation);
        }

        let transformation = match current {
            Some(t) => t,
            None => identity,
        };
        let final_cost = levels.last().map_or(0.0, |l| l.final_cost);
        state_trace.push(DriverState::Done);
        tracing::info!(final_cost, "registration finished");
        Ok(RegistrationOutcome {
            transformation,
            levels,
            final_cost,
            state_trace,
            identity_shortcut: false,
        })
    }

    fn run_level<B: Backend>(
        &self,
        level: usize,
        ratio: f64,
        floating: &Image<B, D>,
        reference: &Image<B, D>,
        previous: Option<Box<dyn Transformation<D>>>,
        state_trace: &mut Vec<DriverState>,
    ) -> Result<(Box<dyn Transformation<D>>, LevelReport)> {
        let floating_field = ScalarField::from_image(floating)?;
        let reference_field = Arc::new(ScalarField::from_image(reference)?);
        let size = reference_field.size();
        self.progress.level_start(level, &size);

        let mut transformation = match previous {
            None => self.transformation.identity(size)?,
            Some(coarser) => coarser.upscale(size)?,
        };
        let level_config = &self.config.level;
        let (minimizer, refinement) = if level_config.rescale_with_spacing {
            transformation.set_penalty_scale(penalty_scale(transformation.penalty_order(), ratio));
            let scale = step_scale(ratio);
            (self.minimizer.scaled(scale), self.refinement.as_ref().map(|m| m.scaled(scale)))
        } else {
            (self.minimizer.scaled(1.0), self.refinement.as_ref().map(|m| m.scaled(1.0)))
        };

        let costs = CostAggregator::from_factories(&self.costs, reference_field)?;
        costs.check_sizes(transformation.as_ref())?;
        let interpolator = transformation.resampling().interpolator(&floating_field);
        let mut regularizer = self.regularizer.clone();
        if let Some(r) = regularizer.as_mut() {
            r.reset();
        }

        tracing::info!(level, ?size, ratio, transformation = transformation.name(), "level setup");
        state_trace.push(DriverState::Optimizing(level));

        let mut monitor = LevelMonitor {
            level,
            budget: level_config.max_iterations,
            steps: 0,
            tracker: ConvergenceTracker::new(
                level_config.convergence_window,
                level_config.convergence_threshold,
            ),
            progress: &self.progress,
            cancellation: self.cancellation.as_ref(),
            budget_exhausted: false,
            cancelled: false,
        };

        let mut parameters = transformation.parameters();
        let mut report = LevelReport {
            level,
            size: size.to_vec(),
            status: MinimizerStatus::Converged,
            iterations: 0,
            evaluations: 0,
            initial_cost: f64::NAN,
            final_cost: f64::NAN,
            converged: false,
            iteration_limited: false,
            sor_non_convergence: None,
        };

        let passes = std::iter::once(minimizer).chain(refinement);
        for (pass, minimizer) in passes.enumerate() {
            if pass > 0 {
                monitor.restart();
            }
            let outcome = minimize(
                minimizer.as_ref(),
                &costs,
                interpolator.as_ref(),
                transformation.as_mut(),
                regularizer.as_mut(),
                &mut parameters,
                &mut monitor,
            );
            transformation.set_parameters(&parameters)?;
            if monitor.cancelled {
                tracing::info!(level, "registration cancelled");
                return Err(RegistrationError::Cancelled);
            }

            let (minimizer_report, evaluations, sor_limited) = match outcome {
                Ok(result) => result,
                Err(RegistrationError::NonConvergence(message)) => {
                    tracing::warn!(level, %message, "regularizer did not converge, keeping the best parameters");
                    report.sor_non_convergence = Some(message);
                    report.status = MinimizerStatus::IterationLimit;
                    report.iteration_limited = true;
                    report.iterations += monitor.steps;
                    break;
                }
                Err(e) => return Err(e),
            };
            if let Some(message) = sor_limited {
                tracing::warn!(level, %message, "regularizer stopped at its sweep budget");
                report.sor_non_convergence.get_or_insert(message);
            }

            tracing::debug!(level, minimizer = minimizer.name(), ?minimizer_report, "minimizer finished");
            if report.initial_cost.is_nan() {
                report.initial_cost = minimizer_report.initial_value;
            }
            report.final_cost = minimizer_report.final_value;
            report.status = minimizer_report.status;
            report.iterations += monitor.steps;
            report.evaluations += evaluations;
            report.converged = monitor.tracker.is_converged()
                || (minimizer_report.status == MinimizerStatus::Converged && !monitor.budget_exhausted);
            report.iteration_limited = monitor.budget_exhausted
                || matches!(
                    minimizer_report.status,
                    MinimizerStatus::IterationLimit | MinimizerStatus::LineSearchFailed
                );
        }

        if report.final_cost.is_nan() || report.initial_cost.is_nan() {
            let value = costs.value(transformation.as_ref(), interpolator.as_ref())?;
            if report.initial_cost.is_nan() {
                report.initial_cost = value;
            }
            report.final_cost = value;
        }
        if report.iteration_limited {
            tracing::warn!(level, status = ?report.status, "level stopped before convergence");
        }
        tracing::info!(
            level,
            iterations = report.iterations,
            initial_cost = report.initial_cost,
            final_cost = report.final_cost,
            "level finished"
        );
        Ok((transformation, report))
    }
}

/// One minimizer run on the level's problem; returns the report, the
/// number of oracle evaluations and, for the regularized problem, a note on
/// relaxations that ran out of sweeps.
fn minimize<const D: usize>(
    minimizer: &dyn Minimizer,
    costs: &CostAggregator<D>,
    floating: &dyn mireg_core::Interpolator<D>,
    transformation: &mut dyn Transformation<D>,
    regularizer: Option<&mut Box<dyn VectorFieldRegularizer<D>>>,
    parameters: &mut [f64],
    monitor: &mut dyn StepMonitor,
) -> Result<(MinimizerReport, usize, Option<String>)> {
    match regularizer {
        Some(regularizer) if transformation.is_dense() => {
            let mut problem = RegularizedProblem::new(costs, floating, transformation, &mut **regularizer);
            let report = minimizer.minimize(&mut problem, parameters, monitor)?;
            let limited = problem.iteration_limited().map(|(count, last)| {
                format!(
                    "{count} relaxation(s) reached the sweep limit, last after {} sweeps with residual {:e}",
                    last.iterations, last.residual
                )
            });
            Ok((report, problem.evaluations(), limited))
        }
        _ => {
            let mut problem = LevelProblem::new(costs, floating, transformation);
            let report = minimizer.minimize(&mut problem, parameters, monitor)?;
            Ok((report, problem.evaluations(), None))
        }
    }
}
