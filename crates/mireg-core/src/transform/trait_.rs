//! Transformation trait for parametrized displacement fields.
//!
//! This module defines the core Transformation trait that the spline and
//! dense-field families implement, and the factory that creates identities.

use std::fmt::Debug;
use crate::error::{CoreError, Result};
use crate::image::{ScalarField, VectorField};
use crate::interpolation::{Interpolator, ResamplingConfig};

/// A parametrized mapping `T(x) = x + u(x)` on a fixed grid.
///
/// Coordinates are continuous sample indices in tensor axis order and the
/// displacement `u` is measured in samples of the grid the transformation
/// lives on. The parameter count is fixed for a given grid; moving to another
/// grid goes through [`Transformation::upscale`].
///
/// # Type Parameters
/// * `D` - The spatial dimensionality (2 or 3)
pub trait Transformation<const D: usize>: Send + Sync + Debug {
    /// Family name as used in plugin strings.
    fn name(&self) -> &str;

    /// Grid size the transformation is defined on.
    fn size(&self) -> [usize; D];

    /// Number of parameters.
    fn degrees_of_freedom(&self) -> usize;

    /// Copy of the parameter vector.
    fn parameters(&self) -> Vec<f64>;

    /// Replace the parameter vector.
    ///
    /// Fails with [`CoreError::ShapeMismatch`] if the length differs from
    /// [`Transformation::degrees_of_freedom`].
    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()>;

    /// The induced displacement `u` at every grid point.
    fn displacement_field(&self) -> &VectorField<D>;

    /// Kernel and boundary policy used by [`Transformation::apply`].
    fn resampling(&self) -> &ResamplingConfig;

    /// Map a per-sample force field into parameter space.
    ///
    /// This is the adjoint of the parameter-to-displacement map, so
    /// `<gradient(f), p> == <f, u(p)>`.
    fn gradient(&self, force: &VectorField<D>) -> Result<Vec<f64>>;

    /// The same deformation on a grid of `size`.
    ///
    /// Displacements are rescaled so they stay in samples of the new grid.
    fn upscale(&self, size: [usize; D]) -> Result<Box<dyn Transformation<D>>>;

    /// Boxed copy.
    fn clone_box(&self) -> Box<dyn Transformation<D>>;

    /// True if every grid point carries its own displacement.
    fn is_dense(&self) -> bool {
        false
    }

    /// Intrinsic smoothness penalty. If `gradient` is given, the penalty's
    /// derivative is added into it.
    fn energy_penalty(&self, _gradient: Option<&mut [f64]>) -> f64 {
        0.0
    }

    fn has_energy_penalty(&self) -> bool {
        false
    }

    /// Derivative order of the penalty (0 if there is none).
    fn penalty_order(&self) -> usize {
        0
    }

    /// Extra factor on the penalty, used to keep it comparable across levels.
    fn set_penalty_scale(&mut self, _scale: f64) {}

    /// Resample `source` through the transformation: `out(x) = F(x + u(x))`.
    fn warp(&self, source: &dyn Interpolator<D>) -> Result<ScalarField<D>> {
        let field = self.displacement_field();
        if source.size() != field.size() {
            return Err(CoreError::shape_mismatch(&field.size(), &source.size()));
        }
        let grid = *field.grid();
        let displacements = field.values();
        Ok(ScalarField::from_fn(grid, |index| {
            let u = displacements[grid.linear_index(&index)];
            let x: [f64; D] = std::array::from_fn(|a| index[a] as f64 + u[a]);
            source.sample(&x)
        }))
    }

    /// Resample an image with the configured kernel and boundary policy.
    fn apply(&self, image: &ScalarField<D>) -> Result<ScalarField<D>> {
        let interpolator = self.resampling().interpolator(image);
        self.warp(interpolator.as_ref())
    }
}

impl<const D: usize> Clone for Box<dyn Transformation<D>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Creates identity transformations of one family.
pub trait TransformationFactory<const D: usize>: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Identity transformation on a grid of `size`.
    fn identity(&self, size: [usize; D]) -> Result<Box<dyn Transformation<D>>>;
}
