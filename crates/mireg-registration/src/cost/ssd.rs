//! Sum of squared differences.

use std::sync::Arc;
use mireg_core::{ScalarField, VectorField};
use rayon::prelude::*;
use crate::error::Result;
use super::trait_::{check_force, check_grid, row_sum, validate_weight, CostTerm, CostTermFactory};

/// Half the mean squared intensity difference:
/// `0.5 / N * sum((W(x) - R(x))^2)`.
///
/// The force at `x` is `(W(x) - R(x)) * grad W(x) / N`.
#[derive(Debug, Clone)]
pub struct SsdCost<const D: usize> {
    reference: Arc<ScalarField<D>>,
}

impl<const D: usize> SsdCost<D> {
    pub fn new(reference: Arc<ScalarField<D>>) -> Self {
        Self { reference }
    }
}

impl<const D: usize> CostTerm<D> for SsdCost<D> {
    fn name(&self) -> &str {
        "ssd"
    }

    fn size(&self) -> [usize; D] {
        self.reference.size()
    }

    fn value(&self, warped: &ScalarField<D>) -> Result<f64> {
        check_grid("ssd", &self.reference, warped)?;
        let w = warped.values();
        let r = self.reference.values();
        let sum = row_sum(warped, |i| {
            let d = w[i] - r[i];
            d * d
        });
        Ok(0.5 * sum / w.len() as f64)
    }

    fn evaluate_force(&self, warped: &ScalarField<D>, force: &mut VectorField<D>) -> Result<f64> {
        check_force("ssd", &self.reference, force)?;
        let value = self.value(warped)?;
        let w = warped.values();
        let r = self.reference.values();
        let scale = 1.0 / w.len() as f64;
        force.values_mut().par_iter_mut().enumerate().for_each(|(i, f)| {
            let d = (w[i] - r[i]) * scale;
            if d != 0.0 {
                let g = warped.gradient_at(i);
                for (fa, ga) in f.iter_mut().zip(g) {
                    *fa += d * ga;
                }
            }
        });
        Ok(value)
    }
}

/// Factory for [`SsdCost`].
#[derive(Debug, Clone, Copy)]
pub struct SsdFactory {
    weight: f64,
}

impl Default for SsdFactory {
    fn default() -> Self {
        Self { weight: 1.0 }
    }
}

impl SsdFactory {
    pub fn new(weight: f64) -> Result<Self> {
        validate_weight(weight)?;
        Ok(Self { weight })
    }
}

impl<const D: usize> CostTermFactory<D> for SsdFactory {
    fn name(&self) -> &str {
        "ssd"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn create(&self, reference: Arc<ScalarField<D>>) -> Result<Box<dyn CostTerm<D>>> {
        Ok(Box::new(SsdCost::new(reference)))
    }
}
