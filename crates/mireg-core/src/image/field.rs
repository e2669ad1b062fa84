//! Host-side scalar and vector fields on a [`Grid`].

use burn::tensor::backend::Backend;
use rayon::prelude::*;
use crate::error::{CoreError, Result};
use crate::spatial::{Point, Spacing};
use super::{Grid, Image};

/// Scalar samples on a grid, e.g. one pyramid level of an image.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField<const D: usize> {
    grid: Grid<D>,
    values: Vec<f64>,
}

impl<const D: usize> ScalarField<D> {
    /// Wrap samples stored in row-major order.
    pub fn new(grid: Grid<D>, values: Vec<f64>) -> Result<Self> {
        if values.len() != grid.len() {
            return Err(CoreError::shape_mismatch(&[grid.len()], &[values.len()]));
        }
        Ok(Self { grid, values })
    }

    /// A field of zeros.
    pub fn zeros(grid: Grid<D>) -> Self {
        Self { values: vec![0.0; grid.len()], grid }
    }

    /// Evaluate `f` at every grid index.
    pub fn from_fn(grid: Grid<D>, f: impl Fn([usize; D]) -> f64 + Sync) -> Self {
        let values = (0..grid.len())
            .into_par_iter()
            .map(|i| f(grid.index_of(i)))
            .collect();
        Self { grid, values }
    }

    /// Pull the samples of an image to the host.
    pub fn from_image<B: Backend>(image: &Image<B, D>) -> Result<Self> {
        let grid = Grid::new(image.shape())?;
        Self::new(grid, image.to_host()?)
    }

    /// Upload the samples as an image with the given metadata.
    pub fn to_image<B: Backend>(
        &self,
        origin: Point<D>,
        spacing: Spacing<D>,
        device: &B::Device,
    ) -> Image<B, D> {
        Image::from_host(&self.values, self.grid.size(), origin, spacing, device)
    }

    pub fn grid(&self) -> &Grid<D> {
        &self.grid
    }

    pub fn size(&self) -> [usize; D] {
        self.grid.size()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Sample at a grid index.
    pub fn at(&self, index: &[usize; D]) -> f64 {
        self.values[self.grid.linear_index(index)]
    }

    /// Finite-difference gradient in units of value per pixel.
    ///
    /// Central differences inside the grid, one-sided differences on faces,
    /// zero along axes of length one.
    pub fn gradient_at(&self, linear: usize) -> [f64; D] {
        let index = self.grid.index_of(linear);
        let size = self.grid.size();
        let strides = self.grid.strides();
        std::array::from_fn(|a| {
            let n = size[a];
            if n < 2 {
                return 0.0;
            }
            let i = index[a];
            let s = strides[a];
            if i == 0 {
                self.values[linear + s] - self.values[linear]
            } else if i + 1 == n {
                self.values[linear] - self.values[linear - s]
            } else {
                0.5 * (self.values[linear + s] - self.values[linear - s])
            }
        })
    }

    /// True if every sample is finite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

/// One displacement (or force) vector per grid point.
///
/// Component `k` of every vector refers to axis `k` of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField<const D: usize> {
    grid: Grid<D>,
    values: Vec<[f64; D]>,
}

impl<const D: usize> VectorField<D> {
    /// A field of zero vectors.
    pub fn zeros(grid: Grid<D>) -> Self {
        Self { values: vec![[0.0; D]; grid.len()], grid }
    }

    /// Wrap vectors stored in row-major order.
    pub fn new(grid: Grid<D>, values: Vec<[f64; D]>) -> Result<Self> {
        if values.len() != grid.len() {
            return Err(CoreError::shape_mismatch(&[grid.len()], &[values.len()]));
        }
        Ok(Self { grid, values })
    }

    /// Rebuild a field from the component-interleaved layout of [`Self::to_flat`].
    pub fn from_flat(grid: Grid<D>, flat: &[f64]) -> Result<Self> {
        if flat.len() != grid.len() * D {
            return Err(CoreError::shape_mismatch(&[grid.len() * D], &[flat.len()]));
        }
        let values = flat
            .chunks_exact(D)
            .map(|c| std::array::from_fn(|k| c[k]))
            .collect();
        Ok(Self { grid, values })
    }

    /// Component-interleaved copy: `[v0.x0, v0.x1, .., v1.x0, ..]`.
    pub fn to_flat(&self) -> Vec<f64> {
        self.values.iter().flat_map(|v| v.iter().copied()).collect()
    }

    pub fn grid(&self) -> &Grid<D> {
        &self.grid
    }

    pub fn size(&self) -> [usize; D] {
        self.grid.size()
    }

    pub fn values(&self) -> &[[f64; D]] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [[f64; D]] {
        &mut self.values
    }

    /// Vector at a grid index.
    pub fn at(&self, index: &[usize; D]) -> [f64; D] {
        self.values[self.grid.linear_index(index)]
    }

    /// Set every vector to zero.
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|v| *v = [0.0; D]);
    }

    /// Largest Euclidean norm over all vectors.
    pub fn max_norm(&self) -> f64 {
        self.values
            .iter()
            .map(|v| v.iter().map(|c| c * c).sum::<f64>().sqrt())
            .fold(0.0, f64::max)
    }

    /// Largest absolute component over all vectors.
    pub fn max_abs(&self) -> f64 {
        self.values
            .iter()
            .flat_map(|v| v.iter())
            .fold(0.0, |m, c| m.max(c.abs()))
    }

    /// `self += weight * other`.
    pub fn add_scaled(&mut self, other: &VectorField<D>, weight: f64) -> Result<()> {
        self.grid.check_same(&other.grid)?;
        self.values
            .par_iter_mut()
            .zip(other.values.par_iter())
            .for_each(|(v, o)| {
                for k in 0..D {
                    v[k] += weight * o[k];
                }
            });
        Ok(())
    }

    /// Multiply every vector by a scalar.
    pub fn scale(&mut self, factor: f64) {
        self.values.par_iter_mut().for_each(|v| v.iter_mut().for_each(|c| *c *= factor));
    }

    /// Sum of component-wise products.
    pub fn dot(&self, other: &VectorField<D>) -> Result<f64> {
        self.grid.check_same(&other.grid)?;
        Ok(self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (0..D).map(|k| a[k] * b[k]).sum::<f64>())
            .sum())
    }

    /// True if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().flat_map(|v| v.iter()).all(|c| c.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_gradient() {
        let grid = Grid::new([3, 4]).unwrap();
        // f(y, x) = 2x + 3y
        let field = ScalarField::from_fn(grid, |[y, x]| 2.0 * x as f64 + 3.0 * y as f64);
        for linear in 0..grid.len() {
            let g = field.gradient_at(linear);
            assert!((g[0] - 3.0).abs() < 1e-12);
            assert!((g[1] - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_scalar_size_mismatch() {
        let grid = Grid::new([2, 2]).unwrap();
        assert!(ScalarField::new(grid, vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_vector_flat_layout() {
        let grid = Grid::new([1, 2]).unwrap();
        let field = VectorField::new(grid, vec![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert_eq!(field.to_flat(), vec![1.0, 2.0, 3.0, 4.0]);
        let back = VectorField::from_flat(grid, &field.to_flat()).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn test_vector_norms_and_scaling() {
        let grid = Grid::new([2]).unwrap();
        let mut field = VectorField::new(grid, vec![[3.0], [-4.0]]).unwrap();
        assert_eq!(field.max_norm(), 4.0);
        field.scale(0.5);
        assert_eq!(field.max_abs(), 2.0);
        let other = field.clone();
        field.add_scaled(&other, 1.0).unwrap();
        assert_eq!(field.values(), &[[3.0], [-4.0]]);
        assert_eq!(field.dot(&other).unwrap(), 3.0 * 1.5 + 4.0 * 2.0);
    }
}
