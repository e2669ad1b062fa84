use burn::tensor::{Int, Tensor};
use burn::tensor::backend::Backend;
use crate::image::Image;

/// Downsample filter.
///
/// Reduces the image size by integer factors by keeping every Nth sample,
/// starting at index 0, so an axis of `n` samples becomes `ceil(n / factor)`.
/// Updates spacing to reflect the new resolution; the origin is unchanged.
pub struct DownsampleFilter<B: Backend> {
    factors: Vec<usize>,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> DownsampleFilter<B> {
    /// Create a new downsample filter.
    ///
    /// # Arguments
    /// * `factors` - Downsampling factor for each dimension; a single value
    ///   applies to every axis.
    pub fn new(factors: Vec<usize>) -> Self {
        Self {
            factors,
            _b: std::marker::PhantomData,
        }
    }

    /// Apply the filter to an image.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let mut data = image.data().clone();
        let device = data.device();
        let dims: [usize; D] = data.dims();
        let mut new_spacing = *image.spacing();

        for d in 0..D {
            let factor = self.factors.get(d).or(self.factors.first()).copied().unwrap_or(1);
            if factor <= 1 {
                continue;
            }

            let indices_vec: Vec<i32> = (0..dims[d]).step_by(factor).map(|x| x as i32).collect();
            let indices = Tensor::<B, 1, Int>::from_ints(indices_vec.as_slice(), &device);
            data = data.select(d, indices);

            new_spacing[d] *= factor as f64;
        }

        Image::new(data, *image.origin(), new_spacing)
    }
}
