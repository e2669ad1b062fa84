//! Normalized cross correlation over the whole image.

use std::sync::Arc;
use mireg_core::{ScalarField, VectorField};
use rayon::prelude::*;
use crate::error::Result;
use super::trait_::{check_force, check_grid, row_sum, validate_weight, CostTerm, CostTermFactory};

/// Squared correlation below this denominator counts as undefined.
const MIN_VARIANCE: f64 = 1e-12;

/// `1 - ncc^2` with `ncc = sum(w' r') / sqrt(sum(w'^2) sum(r'^2))` over the
/// mean-free intensities `w'`, `r'`.
///
/// Insensitive to linear intensity changes; the cost is 0 for perfectly
/// (anti-)correlated images and 1 when either image is constant.
#[derive(Debug, Clone)]
pub struct NccCost<const D: usize> {
    reference: Arc<ScalarField<D>>,
    reference_mean: f64,
    reference_ss: f64,
}

/// Moments of the warped image against the reference.
struct Moments {
    warped_mean: f64,
    cross: f64,
    warped_ss: f64,
}

impl<const D: usize> NccCost<D> {
    pub fn new(reference: Arc<ScalarField<D>>) -> Self {
        let r = reference.values();
        let n = r.len() as f64;
        let reference_mean = row_sum(&reference, |i| r[i]) / n;
        let reference_ss = row_sum(&reference, |i| (r[i] - reference_mean).powi(2));
        Self {
            reference,
            reference_mean,
            reference_ss,
        }
    }

    fn moments(&self, warped: &ScalarField<D>) -> Moments {
        let w = warped.values();
        let r = self.reference.values();
        let warped_mean = row_sum(warped, |i| w[i]) / w.len() as f64;
        let cross = row_sum(warped, |i| (w[i] - warped_mean) * (r[i] - self.reference_mean));
        let warped_ss = row_sum(warped, |i| (w[i] - warped_mean).powi(2));
        Moments {
            warped_mean,
            cross,
            warped_ss,
        }
    }

    fn cost(&self, m: &Moments) -> Option<f64> {
        let denominator = m.warped_ss * self.reference_ss;
        (denominator > MIN_VARIANCE).then(|| 1.0 - m.cross * m.cross / denominator)
    }
}

impl<const D: usize> CostTerm<D> for NccCost<D> {
    fn name(&self) -> &str {
        "ncc"
    }

    fn size(&self) -> [usize; D] {
        self.reference.size()
    }

    fn value(&self, warped: &ScalarField<D>) -> Result<f64> {
        check_grid("ncc", &self.reference, warped)?;
        Ok(self.cost(&self.moments(warped)).unwrap_or(1.0))
    }

    fn evaluate_force(&self, warped: &ScalarField<D>, force: &mut VectorField<D>) -> Result<f64> {
        check_grid("ncc", &self.reference, warped)?;
        check_force("ncc", &self.reference, force)?;
        let m = self.moments(warped);
        let Some(value) = self.cost(&m) else {
            return Ok(1.0);
        };

        // d cost / d w_i = 2a/(bc) * (a/b * w'_i - r'_i)
        let outer = 2.0 * m.cross / (m.warped_ss * self.reference_ss);
        let ratio = m.cross / m.warped_ss;
        let w = warped.values();
        let r = self.reference.values();
        force.values_mut().par_iter_mut().enumerate().for_each(|(i, f)| {
            let d = outer * (ratio * (w[i] - m.warped_mean) - (r[i] - self.reference_mean));
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

/// Factory for [`NccCost`].
#[derive(Debug, Clone, Copy)]
pub struct NccFactory {
    weight: f64,
}

impl Default for NccFactory {
    fn default() -> Self {
        Self { weight: 1.0 }
    }
}

impl NccFactory {
    pub fn new(weight: f64) -> Result<Self> {
        validate_weight(weight)?;
        Ok(Self { weight })
    }
}

impl<const D: usize> CostTermFactory<D> for NccFactory {
    fn name(&self) -> &str {
        "ncc"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn create(&self, reference: Arc<ScalarField<D>>) -> Result<Box<dyn CostTerm<D>>> {
        Ok(Box::new(NccCost::new(reference)))
    }
}
