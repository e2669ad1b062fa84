//! Optimization problems of one pyramid level.
//!
//! Both adapters write the trial parameters into the level's transformation,
//! evaluate the cost aggregator, and report the parameter-space gradient to
//! the minimizer. The caller re-applies the minimizer's best point afterwards.

use mireg_core::{Interpolator, Transformation, VectorField};
use crate::cost::CostAggregator;
use crate::error::Result;
use crate::minimizer::Problem;
use crate::regularizer::{SorReport, SorStatus, VectorFieldRegularizer};

/// Cost oracle for a parametric transformation.
pub struct LevelProblem<'a, const D: usize> {
    costs: &'a CostAggregator<D>,
    floating: &'a dyn Interpolator<D>,
    transformation: &'a mut dyn Transformation<D>,
    evaluations: usize,
}

impl<'a, const D: usize> LevelProblem<'a, D> {
    pub fn new(
        costs: &'a CostAggregator<D>,
        floating: &'a dyn Interpolator<D>,
        transformation: &'a mut dyn Transformation<D>,
    ) -> Self {
        Self {
            costs,
            floating,
            transformation,
            evaluations: 0,
        }
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}

impl<const D: usize> Problem for LevelProblem<'_, D> {
    fn size(&self) -> usize {
        self.transformation.degrees_of_freedom()
    }

    fn value(&mut self, x: &[f64]) -> Result<f64> {
        self.evaluations += 1;
        self.transformation.set_parameters(x)?;
        self.costs.value(&*self.transformation, self.floating)
    }

    fn value_and_gradient(&mut self, x: &[f64], gradient: &mut [f64]) -> Result<f64> {
        self.evaluations += 1;
        self.transformation.set_parameters(x)?;
        let (value, g) = self.costs.evaluate(&*self.transformation, self.floating)?;
        gradient.copy_from_slice(&g);
        Ok(value)
    }
}

/// Cost oracle for the dense family: the raw force field is smoothed by a
/// [`VectorFieldRegularizer`] and the regularized field is used as the
/// descent direction.
pub struct RegularizedProblem<'a, const D: usize> {
    costs: &'a CostAggregator<D>,
    floating: &'a dyn Interpolator<D>,
    transformation: &'a mut dyn Transformation<D>,
    regularizer: &'a mut dyn VectorFieldRegularizer<D>,
    force: VectorField<D>,
    evaluations: usize,
    /// Relaxations stopped by their sweep budget, and the last of them.
    limited: Option<(usize, SorReport)>,
}

impl<'a, const D: usize> RegularizedProblem<'a, D> {
    pub fn new(
        costs: &'a CostAggregator<D>,
        floating: &'a dyn Interpolator<D>,
        transformation: &'a mut dyn Transformation<D>,
        regularizer: &'a mut dyn VectorFieldRegularizer<D>,
    ) -> Self {
        let force = VectorField::zeros(*transformation.displacement_field().grid());
        Self {
            costs,
            floating,
            transformation,
            regularizer,
            force,
            evaluations: 0,
            limited: None,
        }
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Number of relaxations that ran out of sweeps before reaching their
    /// tolerance, with the report of the most recent one.
    pub fn iteration_limited(&self) -> Option<(usize, SorReport)> {
        self.limited
    }
}

impl<const D: usize> Problem for RegularizedProblem<'_, D> {
    fn size(&self) -> usize {
        self.transformation.degrees_of_freedom()
    }

    fn value(&mut self, x: &[f64]) -> Result<f64> {
        self.evaluations += 1;
        self.transformation.set_parameters(x)?;
        self.costs.value(&*self.transformation, self.floating)
    }

    fn value_and_gradient(&mut self, x: &[f64], gradient: &mut [f64]) -> Result<f64> {
        self.evaluations += 1;
        self.transformation.set_parameters(x)?;
        let mut value = self
            .costs
            .evaluate_force(&*self.transformation, self.floating, &mut self.force)?;
        value += self.transformation.energy_penalty(None);

        let report = self.regularizer.run(&self.force)?;
        if report.status == SorStatus::IterationLimit {
            let count = self.limited.map_or(0, |(n, _)| n);
            self.limited = Some((count + 1, report));
        }
        let direction = match self.regularizer.solution() {
            Some(solution) => self.transformation.gradient(solution)?,
            None => self.transformation.gradient(&self.force)?,
        };
        gradient.copy_from_slice(&direction);
        Ok(value)
    }
}
