//! Image type with physical metadata.
//!
//! This module provides the Image struct which holds tensor data together with
//! the physical placement of its samples (origin, spacing).

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use crate::error::{CoreError, Result};
use crate::spatial::{Point, Spacing};

/// Image with physical metadata.
///
/// The Image type combines tensor data (potentially on GPU) with the metadata
/// that describes how sample indices map to physical coordinates. It is the
/// type exchanged with I/O and consumed read-only by the registration driver.
///
/// # Type Parameters
/// * `B` - The backend (CPU or GPU) for tensor operations
/// * `D` - The dimensionality of the image (2 or 3)
///
/// # Coordinate Systems
/// * **Index Space**: Discrete sample indices in tensor axis order
/// * **Physical Space**: `origin + index * spacing`, per axis
///
/// # Examples
/// ```rust
/// use mireg_core::Image;
/// use mireg_core::spatial::{Point2, Spacing2};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 2>::zeros([16, 32], &device);
/// let image = Image::new(data, Point2::origin(), Spacing2::uniform(1.0));
/// assert_eq!(image.shape(), [16, 32]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    /// The sample data, potentially on GPU.
    data: Tensor<B, D>,
    /// Physical coordinate of the first sample.
    origin: Point<D>,
    /// Physical distance between samples along each axis.
    spacing: Spacing<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a new image with the given data and metadata.
    pub fn new(data: Tensor<B, D>, origin: Point<D>, spacing: Spacing<D>) -> Self {
        Self { data, origin, spacing }
    }

    /// Create an image from host samples stored in row-major order.
    ///
    /// # Arguments
    /// * `values` - Samples, last axis fastest
    /// * `shape` - Number of samples along each axis
    /// * `origin` - Physical coordinate of the first sample
    /// * `spacing` - Physical distance between samples
    /// * `device` - Device the tensor is created on
    pub fn from_host(
        values: &[f64],
        shape: [usize; D],
        origin: Point<D>,
        spacing: Spacing<D>,
        device: &B::Device,
    ) -> Self {
        let samples: Vec<f32> = values.iter().map(|&v| v as f32).collect();
        let data = Tensor::<B, D>::from_data(TensorData::new(samples, shape), device);
        Self::new(data, origin, spacing)
    }

    /// Get the image data tensor.
    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    /// Get the origin (physical coordinate of first sample).
    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    /// Get the spacing (physical distance between samples).
    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    /// Get the image shape as an array.
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Number of samples.
    pub fn num_samples(&self) -> usize {
        self.shape().iter().product()
    }

    /// Replace the samples, keeping the metadata.
    pub fn with_data(&self, data: Tensor<B, D>) -> Self {
        Self::new(data, self.origin, self.spacing)
    }

    /// Copy the samples to the host in row-major order.
    pub fn to_host(&self) -> Result<Vec<f64>> {
        self.data
            .clone()
            .into_data()
            .convert::<f64>()
            .to_vec::<f64>()
            .map_err(|e| CoreError::TensorData(format!("{e:?}")))
    }

    /// Sum of all samples, reduced on the backend.
    pub fn sum(&self) -> f64 {
        self.data.clone().sum().into_scalar().elem::<f64>()
    }

    /// Sum of squared deviations from `mean`, reduced on the backend.
    pub fn sum_squared_deviation(&self, mean: f64) -> f64 {
        self.data
            .clone()
            .sub_scalar(mean)
            .powf_scalar(2.0)
            .sum()
            .into_scalar()
            .elem::<f64>()
    }

    /// Apply `a * value + b` to every sample.
    pub fn map_linear(&self, a: f64, b: f64) -> Self {
        self.with_data(self.data.clone().mul_scalar(a).add_scalar(b))
    }

    /// Convert a continuous index to a physical point.
    pub fn index_to_physical(&self, index: &[f64; D]) -> Point<D> {
        let mut point = self.origin;
        for a in 0..D {
            point[a] += index[a] * self.spacing[a];
        }
        point
    }

    /// Convert a physical point to a continuous index.
    pub fn physical_to_index(&self, point: &Point<D>) -> [f64; D] {
        std::array::from_fn(|a| (point[a] - self.origin[a]) / self.spacing[a])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn test_image_creation() {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([4, 5, 6], &device);
        let origin = Point::new([1.0, 2.0, 3.0]);
        let spacing = Spacing::new([1.0, 0.5, 2.0]);
        let image = Image::new(data, origin, spacing);

        assert_eq!(image.shape(), [4, 5, 6]);
        assert_eq!(image.num_samples(), 120);
        assert_eq!(image.origin(), &origin);
        assert_eq!(image.spacing(), &spacing);
    }

    #[test]
    fn test_host_roundtrip() {
        let device = Default::default();
        let values: Vec<f64> = (0..12).map(|v| v as f64 * 0.5).collect();
        let image = Image::<Backend, 2>::from_host(
            &values,
            [3, 4],
            Point::origin(),
            Spacing::uniform(1.0),
            &device,
        );
        assert_eq!(image.to_host().unwrap(), values);
    }

    #[test]
    fn test_reductions_and_linear_map() {
        let device = Default::default();
        let image = Image::<Backend, 1>::from_host(
            &[1.0, 2.0, 3.0],
            [3],
            Point::origin(),
            Spacing::uniform(1.0),
            &device,
        );
        assert!((image.sum() - 6.0).abs() < 1e-6);
        assert!((image.sum_squared_deviation(2.0) - 2.0).abs() < 1e-6);

        let mapped = image.map_linear(2.0, -1.0).to_host().unwrap();
        assert_eq!(mapped, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_index_physical_roundtrip() {
        let device = Default::default();
        let data = Tensor::<Backend, 2>::zeros([10, 10], &device);
        let image = Image::new(data, Point::new([10.0, -5.0]), Spacing::new([2.0, 0.5]));

        let point = image.index_to_physical(&[3.0, 4.0]);
        assert_eq!(point.to_array(), [16.0, -3.0]);
        let index = image.physical_to_index(&point);
        assert!((index[0] - 3.0).abs() < 1e-12);
        assert!((index[1] - 4.0).abs() < 1e-12);
    }
}
