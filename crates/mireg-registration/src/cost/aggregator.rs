//! Weighted sum of cost terms, exposed as a single (value, gradient) oracle.

use std::sync::Arc;
use mireg_core::{Interpolator, ScalarField, Transformation, VectorField};
use crate::error::{RegistrationError, Result};
use super::trait_::{CostTerm, CostTermFactory};

/// Ordered list of `(term, weight)` pairs.
///
/// Every call warps the floating image once, sums the weighted values and
/// forces of all terms, and projects the summed force into parameter space.
/// Reordering terms only changes the floating-point summation order.
#[derive(Debug, Default)]
pub struct CostAggregator<const D: usize> {
    terms: Vec<(Box<dyn CostTerm<D>>, f64)>,
}

impl<const D: usize> CostAggregator<D> {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Instantiate every factory against the same reference.
    pub fn from_factories(
        factories: &[Arc<dyn CostTermFactory<D>>],
        reference: Arc<ScalarField<D>>,
    ) -> Result<Self> {
        let mut aggregator = Self::new();
        for factory in factories {
            aggregator.push(factory.create(reference.clone())?, factory.weight());
        }
        Ok(aggregator)
    }

    pub fn push(&mut self, term: Box<dyn CostTerm<D>>, weight: f64) {
        self.terms.push((term, weight));
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms and their weights, in evaluation order.
    pub fn terms(&self) -> impl Iterator<Item = (&dyn CostTerm<D>, f64)> + '_ {
        self.terms.iter().map(|(t, w)| (t.as_ref(), *w))
    }

    /// Every term must live on the transformation's grid.
    pub fn check_sizes(&self, transformation: &dyn Transformation<D>) -> Result<()> {
        if self.terms.is_empty() {
            return Err(RegistrationError::configuration("no cost terms given"));
        }
        let size = transformation.size();
        for (term, _) in &self.terms {
            if term.size() != size {
                return Err(RegistrationError::configuration(format!(
                    "cost term '{}' has size {:?}, transformation '{}' has size {:?}",
                    term.name(),
                    term.size(),
                    transformation.name(),
                    size
                )));
            }
        }
        Ok(())
    }

    fn warp(
        &self,
        transformation: &dyn Transformation<D>,
        floating: &dyn Interpolator<D>,
    ) -> Result<ScalarField<D>> {
        self.check_sizes(transformation)?;
        transformation
            .warp(floating)
            .map_err(|e| RegistrationError::contract_violation(format!("cannot warp floating image: {e}")))
    }

    /// Aggregate cost including the transformation's energy penalty.
    pub fn value(
        &self,
        transformation: &dyn Transformation<D>,
        floating: &dyn Interpolator<D>,
    ) -> Result<f64> {
        let warped = self.warp(transformation, floating)?;
        let mut value = 0.0;
        for (term, weight) in &self.terms {
            value += weight * term.value(&warped)?;
        }
        value += transformation.energy_penalty(None);
        check_finite(value)
    }

    /// Weighted similarity value and the summed force field, without the
    /// energy penalty.
    pub fn evaluate_force(
        &self,
        transformation: &dyn Transformation<D>,
        floating: &dyn Interpolator<D>,
        force: &mut VectorField<D>,
    ) -> Result<f64> {
        let warped = self.warp(transformation, floating)?;
        force.clear();
        let mut value = 0.0;
        if let [(term, weight)] = self.terms.as_slice() {
            value += weight * term.evaluate_force(&warped, force)?;
            force.scale(*weight);
        } else {
            let mut term_force = VectorField::zeros(*force.grid());
            for (term, weight) in &self.terms {
                term_force.clear();
                value += weight * term.evaluate_force(&warped, &mut term_force)?;
                force.add_scaled(&term_force, *weight)?;
            }
        }
        if !force.is_finite() {
            return Err(RegistrationError::contract_violation("force field is not finite"));
        }
        check_finite(value)
    }

    /// Aggregate cost and its gradient with respect to the parameters.
    pub fn evaluate(
        &self,
        transformation: &dyn Transformation<D>,
        floating: &dyn Interpolator<D>,
    ) -> Result<(f64, Vec<f64>)> {
        let mut force = VectorField::zeros(*transformation.displacement_field().grid());
        let mut value = self.evaluate_force(transformation, floating, &mut force)?;
        let mut gradient = transformation.gradient(&force)?;
        value += transformation.energy_penalty(Some(gradient.as_mut_slice()));
        if gradient.iter().any(|g| !g.is_finite()) {
            return Err(RegistrationError::contract_violation("gradient is not finite"));
        }
        Ok((check_finite(value)?, gradient))
    }
}

fn check_finite(value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(RegistrationError::contract_violation(format!(
            "cost evaluated to {value}"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mireg_core::interpolation::ResamplingConfig;
    use mireg_core::transform::{DenseFieldTransformation, SplineConfig, SplineTransformation};
    use mireg_core::Grid;
    use crate::cost::{NccFactory, SsdFactory};

    fn blob(size: [usize; 2], shift: f64) -> ScalarField<2> {
        ScalarField::from_fn(Grid::new(size).unwrap(), |[y, x]| {
            let dx = x as f64 - 10.0 - shift;
            let dy = y as f64 - 10.0;
            (-(dx * dx + dy * dy) / 18.0).exp()
        })
    }

    fn aggregator(reference: ScalarField<2>) -> CostAggregator<2> {
        let factories: Vec<Arc<dyn CostTermFactory<2>>> =
            vec![Arc::new(SsdFactory::default()), Arc::new(NccFactory::new(0.5).unwrap())];
        CostAggregator::from_factories(&factories, Arc::new(reference)).unwrap()
    }

    #[test]
    fn test_value_is_deterministic() {
        let costs = aggregator(blob([20, 20], 0.0));
        let floating = blob([20, 20], 1.5);
        let interpolator = ResamplingConfig::default().interpolator(&floating);
        let mut transformation =
            SplineTransformation::identity([20, 20], &SplineConfig::default().with_rate(5.0), ResamplingConfig::default())
                .unwrap();
        let params: Vec<f64> = (0..transformation.degrees_of_freedom())
            .map(|i| 0.1 * ((i * 7 % 11) as f64 - 5.0))
            .collect();
        transformation.set_parameters(&params).unwrap();

        let a = costs.value(&transformation, interpolator.as_ref()).unwrap();
        let b = costs.value(&transformation, interpolator.as_ref()).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());

        let (c, g1) = costs.evaluate(&transformation, interpolator.as_ref()).unwrap();
        let (_, g2) = costs.evaluate(&transformation, interpolator.as_ref()).unwrap();
        assert_eq!(a.to_bits(), c.to_bits());
        assert_eq!(g1, g2);
        assert_eq!(g1.len(), transformation.degrees_of_freedom());
    }

    #[test]
    fn test_weights_are_applied() {
        let reference = blob([16, 16], 0.0);
        let floating = blob([16, 16], 2.0);
        let interpolator = ResamplingConfig::default().interpolator(&floating);
        let transformation = DenseFieldTransformation::identity([16, 16], ResamplingConfig::default()).unwrap();

        let single: Vec<Arc<dyn CostTermFactory<2>>> = vec![Arc::new(SsdFactory::default())];
        let double: Vec<Arc<dyn CostTermFactory<2>>> = vec![Arc::new(SsdFactory::new(2.0).unwrap())];
        let reference = Arc::new(reference);
        let one = CostAggregator::from_factories(&single, reference.clone()).unwrap();
        let two = CostAggregator::from_factories(&double, reference).unwrap();

        let (v1, g1) = one.evaluate(&transformation, interpolator.as_ref()).unwrap();
        let (v2, g2) = two.evaluate(&transformation, interpolator.as_ref()).unwrap();
        assert!((v2 - 2.0 * v1).abs() < 1e-12);
        for (a, b) in g1.iter().zip(&g2) {
            assert!((b - 2.0 * a).abs() < 1e-12);
        }
    }

    #[test]
    fn test_size_mismatch_is_configuration_error() {
        let costs = aggregator(blob([16, 16], 0.0));
        let floating = blob([16, 16], 0.0);
        let interpolator = ResamplingConfig::default().interpolator(&floating);
        let transformation = DenseFieldTransformation::identity([16, 18], ResamplingConfig::default()).unwrap();
        let result = costs.value(&transformation, interpolator.as_ref());
        assert!(matches!(result, Err(RegistrationError::Configuration(_))));
    }

    #[test]
    fn test_floating_mismatch_is_contract_violation() {
        let costs = aggregator(blob([16, 16], 0.0));
        let floating = blob([12, 16], 0.0);
        let interpolator = ResamplingConfig::default().interpolator(&floating);
        let transformation = DenseFieldTransformation::identity([16, 16], ResamplingConfig::default()).unwrap();
        let result = costs.evaluate(&transformation, interpolator.as_ref());
        assert!(matches!(result, Err(RegistrationError::ContractViolation(_))));
    }

    #[test]
    fn test_empty_aggregator_is_rejected() {
        let costs = CostAggregator::<2>::new();
        let transformation = DenseFieldTransformation::identity([8, 8], ResamplingConfig::default()).unwrap();
        assert!(matches!(
            costs.check_sizes(&transformation),
            Err(RegistrationError::Configuration(_))
        ));
    }
}
