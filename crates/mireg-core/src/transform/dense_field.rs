//! Dense displacement field transformation.
//!
//! One displacement vector per grid point. The parameters are unconstrained,
//! so this family is meant to be paired with a vector field regularizer.

use rayon::prelude::*;
use crate::error::Result;
use crate::image::{Grid, ScalarField, VectorField};
use crate::interpolation::{BoundaryMode, Interpolator, LinearInterpolator, ResamplingConfig};
use super::trait_::{Transformation, TransformationFactory};

/// Dense displacement field transformation.
#[derive(Debug, Clone)]
pub struct DenseFieldTransformation<const D: usize> {
    field: VectorField<D>,
    resampling: ResamplingConfig,
}

impl<const D: usize> DenseFieldTransformation<D> {
    /// Identity on a grid of `size`.
    pub fn identity(size: [usize; D], resampling: ResamplingConfig) -> Result<Self> {
        Ok(Self {
            field: VectorField::zeros(Grid::new(size)?),
            resampling,
        })
    }

    /// Wrap an existing displacement field.
    pub fn from_field(field: VectorField<D>, resampling: ResamplingConfig) -> Self {
        Self { field, resampling }
    }

    pub fn field(&self) -> &VectorField<D> {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut VectorField<D> {
        &mut self.field
    }
}

impl<const D: usize> Transformation<D> for DenseFieldTransformation<D> {
    fn name(&self) -> &str {
        "vf"
    }

    fn size(&self) -> [usize; D] {
        self.field.size()
    }

    fn degrees_of_freedom(&self) -> usize {
        self.field.grid().len() * D
    }

    fn parameters(&self) -> Vec<f64> {
        self.field.to_flat()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        self.field = VectorField::from_flat(*self.field.grid(), parameters)?;
        Ok(())
    }

    fn displacement_field(&self) -> &VectorField<D> {
        &self.field
    }

    fn resampling(&self) -> &ResamplingConfig {
        &self.resampling
    }

    fn gradient(&self, force: &VectorField<D>) -> Result<Vec<f64>> {
        self.field.grid().check_same(force.grid())?;
        Ok(force.to_flat())
    }

    fn upscale(&self, size: [usize; D]) -> Result<Box<dyn Transformation<D>>> {
        let old = self.field.grid();
        let grid = Grid::new(size)?;
        let factor = old.upsampling_factor(&size);
        tracing::debug!(from = ?old.size(), to = ?size, ?factor, "upscaling dense field");

        // One interpolator per component; the sampling position x = x' / factor
        // can pass the last sample, so the edge is repeated.
        let components: Vec<LinearInterpolator<D>> = (0..D)
            .map(|a| {
                let values = self.field.values().iter().map(|u| u[a]).collect();
                ScalarField::new(*old, values)
                    .map(|f| LinearInterpolator::new(f, BoundaryMode::Clamp, 0.0))
            })
            .collect::<Result<_>>()?;

        let values: Vec<[f64; D]> = (0..grid.len())
            .into_par_iter()
            .map(|i| {
                let index = grid.index_of(i);
                let x: [f64; D] = std::array::from_fn(|a| index[a] as f64 / factor[a]);
                std::array::from_fn(|a| components[a].sample(&x) * factor[a])
            })
            .collect();

        Ok(Box::new(Self {
            field: VectorField::new(grid, values)?,
            resampling: self.resampling,
        }))
    }

    fn clone_box(&self) -> Box<dyn Transformation<D>> {
        Box::new(self.clone())
    }

    fn is_dense(&self) -> bool {
        true
    }
}

/// Creates [`DenseFieldTransformation`] identities.
#[derive(Debug, Clone, Default)]
pub struct DenseFieldFactory {
    pub resampling: ResamplingConfig,
}

impl DenseFieldFactory {
    pub fn new(resampling: ResamplingConfig) -> Self {
        Self { resampling }
    }
}

impl<const D: usize> TransformationFactory<D> for DenseFieldFactory {
    fn name(&self) -> &str {
        "vf"
    }

    fn identity(&self, size: [usize; D]) -> Result<Box<dyn Transformation<D>>> {
        Ok(Box::new(DenseFieldTransformation::identity(size, self.resampling)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_roundtrip() {
        let mut t = DenseFieldTransformation::identity([3, 4], ResamplingConfig::default()).unwrap();
        assert_eq!(t.degrees_of_freedom(), 24);
        let p: Vec<f64> = (0..24).map(|v| v as f64).collect();
        t.set_parameters(&p).unwrap();
        assert_eq!(t.parameters(), p);
        assert_eq!(t.displacement_field().at(&[0, 1]), [2.0, 3.0]);
        assert!(t.set_parameters(&p[..10]).is_err());
    }

    #[test]
    fn test_gradient_is_identity_on_force() {
        let t = DenseFieldTransformation::identity([2, 2], ResamplingConfig::default()).unwrap();
        let force = VectorField::from_flat(
            Grid::new([2, 2]).unwrap(),
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
        )
        .unwrap();
        assert_eq!(t.gradient(&force).unwrap(), force.to_flat());

        let wrong = VectorField::zeros(Grid::new([3, 2]).unwrap());
        assert!(t.gradient(&wrong).is_err());
    }

    #[test]
    fn test_upscale_constant_field_doubles() {
        let grid = Grid::new([4, 5]).unwrap();
        let field = VectorField::new(grid, vec![[0.5, -1.0]; 20]).unwrap();
        let t = DenseFieldTransformation::from_field(field, ResamplingConfig::default());
        let up = t.upscale([8, 10]).unwrap();
        assert_eq!(up.size(), [8, 10]);
        for u in up.displacement_field().values() {
            assert!((u[0] - 1.0).abs() < 1e-12);
            assert!((u[1] + 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_upscale_reproduces_coincident_points() {
        let grid = Grid::new([6, 6]).unwrap();
        let values = (0..36).map(|i| [(i % 7) as f64 * 0.1, (i % 5) as f64 * -0.2]).collect();
        let t = DenseFieldTransformation::from_field(
            VectorField::new(grid, values).unwrap(),
            ResamplingConfig::default(),
        );
        let up = t.upscale([12, 12]).unwrap();
        for y in 0..6 {
            for x in 0..6 {
                let coarse = t.displacement_field().at(&[y, x]);
                let fine = up.displacement_field().at(&[2 * y, 2 * x]);
                assert!((fine[0] - 2.0 * coarse[0]).abs() < 1e-12);
                assert!((fine[1] - 2.0 * coarse[1]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_upscale_odd_axis_keeps_even_samples() {
        let grid = Grid::new([13, 13]).unwrap();
        let values = (0..grid.len())
            .map(|i| {
                let [_, x] = grid.index_of(i);
                [1.0, (0.5 * x as f64).sin()]
            })
            .collect();
        let t = DenseFieldTransformation::from_field(
            VectorField::new(grid, values).unwrap(),
            ResamplingConfig::default(),
        );
        let up = t.upscale([25, 25]).unwrap();
        for y in 0..13 {
            for x in 0..13 {
                let coarse = t.displacement_field().at(&[y, x]);
                let fine = up.displacement_field().at(&[2 * y, 2 * x]);
                assert!((fine[0] - 2.0 * coarse[0]).abs() < 1e-12, "{y} {x}: {fine:?}");
                assert!((fine[1] - 2.0 * coarse[1]).abs() < 1e-12, "{y} {x}: {fine:?}");
            }
        }
        // In-between samples interpolate their neighbours.
        let mid = up.displacement_field().at(&[0, 13])[1];
        let expected = (0.5 * 6.0f64).sin() + (0.5 * 7.0f64).sin();
        assert!((mid - expected).abs() < 1e-12);
    }
}
