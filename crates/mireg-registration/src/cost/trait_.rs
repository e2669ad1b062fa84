//! Cost term trait and the factory that binds a term to a reference.
//!
//! Cost terms compare the warped floating image against a fixed reference.
//! Lower values indicate better alignment.

use std::fmt::Debug;
use std::sync::Arc;
use mireg_core::{ScalarField, VectorField};
use rayon::prelude::*;
use crate::error::{RegistrationError, Result};

/// Similarity (or dissimilarity) measure against a fixed reference.
///
/// # Type Parameters
/// * `D` - The spatial dimensionality (2 or 3)
pub trait CostTerm<const D: usize>: Send + Sync + Debug {
    /// Identifier as used in plugin strings.
    fn name(&self) -> &str;

    /// Size of the reference grid.
    fn size(&self) -> [usize; D];

    /// Cost of the warped floating image.
    fn value(&self, warped: &ScalarField<D>) -> Result<f64>;

    /// Cost of the warped floating image; the derivative of the cost with
    /// respect to the displacement at every sample is added into `force`.
    fn evaluate_force(&self, warped: &ScalarField<D>, force: &mut VectorField<D>) -> Result<f64>;
}

/// Creates cost terms bound to one level's reference image.
pub trait CostTermFactory<const D: usize>: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Weight of the created term in the aggregate cost.
    fn weight(&self) -> f64;

    fn create(&self, reference: Arc<ScalarField<D>>) -> Result<Box<dyn CostTerm<D>>>;
}

pub(crate) fn check_grid<const D: usize>(
    term: &str,
    reference: &ScalarField<D>,
    warped: &ScalarField<D>,
) -> Result<()> {
    if reference.size() != warped.size() {
        return Err(RegistrationError::contract_violation(format!(
            "{term}: warped image size {:?} differs from reference size {:?}",
            warped.size(),
            reference.size()
        )));
    }
    Ok(())
}

pub(crate) fn check_force<const D: usize>(
    term: &str,
    reference: &ScalarField<D>,
    force: &VectorField<D>,
) -> Result<()> {
    if reference.size() != force.size() {
        return Err(RegistrationError::contract_violation(format!(
            "{term}: force field size {:?} differs from reference size {:?}",
            force.size(),
            reference.size()
        )));
    }
    Ok(())
}

/// Sum of `f(i)` over all samples; rows are reduced in parallel and then
/// added in row order, so the result does not depend on the thread count.
pub(crate) fn row_sum<const D: usize>(
    field: &ScalarField<D>,
    f: impl Fn(usize) -> f64 + Sync,
) -> f64 {
    let row = field.grid().row_len();
    let rows = field.grid().len() / row;
    let partial: Vec<f64> = (0..rows)
        .into_par_iter()
        .map(|r| (r * row..(r + 1) * row).map(&f).sum())
        .collect();
    partial.iter().sum()
}

pub(crate) fn validate_weight(weight: f64) -> Result<()> {
    if !(weight.is_finite() && weight > 0.0) {
        return Err(RegistrationError::configuration(format!(
            "cost weight must be positive and finite, got {weight}"
        )));
    }
    Ok(())
}
