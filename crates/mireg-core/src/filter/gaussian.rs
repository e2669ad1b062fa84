use burn::tensor::{Int, Shape, Tensor};
use burn::tensor::backend::Backend;
use burn::tensor::ops::ConvOptions;
use crate::image::Image;
use crate::interpolation::BoundaryMode;

/// Gaussian smoothing filter.
///
/// Applies a Gaussian smoothing filter to an image using separable 1D convolutions.
/// Sigmas are given in samples; the signal is mirrored at the borders so the
/// filter preserves constants.
pub struct GaussianFilter<B: Backend> {
    sigmas: Vec<f64>,
    max_kernel_width: usize,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> GaussianFilter<B> {
    /// Create a new Gaussian filter.
    ///
    /// # Arguments
    /// * `sigmas` - Standard deviation for each axis in samples. A single value
    ///   applies to every axis.
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            max_kernel_width: 33,
            _b: std::marker::PhantomData,
        }
    }

    /// Set the maximum kernel width (radius * 2 + 1).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    /// Apply the filter to an image.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        image.with_data(self.apply_tensor(image.data().clone()))
    }

    /// Apply the filter to a tensor directly.
    pub fn apply_tensor<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let mut data = input;
        let device = data.device();

        for d in 0..D {
            let sigma = self.sigmas.get(d).or(self.sigmas.first()).copied().unwrap_or(0.0);
            if sigma <= 1e-6 || data.dims()[d] < 2 {
                continue;
            }

            let radius = (3.0 * sigma).ceil() as usize;
            let width = (2 * radius + 1).min(self.max_kernel_width);
            let actual_radius = (width - 1) / 2;
            if actual_radius == 0 {
                continue;
            }

            let kernel = generate_kernel(sigma, actual_radius);
            let kernel_tensor = Tensor::<B, 1>::from_floats(kernel.as_slice(), &device);
            data = convolve_1d::<B, D>(data, kernel_tensor, d);
        }
        data
    }
}

/// Normalized, sampled Gaussian of the given radius.
fn generate_kernel(sigma: f64, radius: usize) -> Vec<f32> {
    let two_sigma2 = 2.0 * sigma * sigma;
    let values: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect();
    let sum: f64 = values.iter().sum();
    values.iter().map(|v| (v / sum) as f32).collect()
}

fn convolve_1d<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    kernel: Tensor<B, 1>,
    dim: usize,
) -> Tensor<B, D> {
    let dims: [usize; D] = input.dims();
    let device = input.device();

    // 1. Permute target dimension to the last
    let mut permute_indices = [0isize; D];
    let mut idx = 0;
    for i in 0..D {
        if i != dim {
            permute_indices[idx] = i as isize;
            idx += 1;
        }
    }
    permute_indices[D - 1] = dim as isize;
    let input_permuted = input.permute(permute_indices);

    // 2. Flatten other dimensions into batch: [Batch, Channels=1, Length]
    let length = dims[dim];
    let batch_size: usize = (0..D).filter(|&i| i != dim).map(|i| dims[i]).product();
    let input_reshaped = input_permuted.reshape([batch_size, 1, length]);

    // 3. Mirror-pad by the kernel radius and convolve without implicit padding
    let kernel_size = kernel.dims()[0];
    let radius = kernel_size / 2;
    let padded_indices: Vec<i32> = (-(radius as isize)..(length + radius) as isize)
        .map(|i| BoundaryMode::Mirror.map_index(i, length).unwrap_or(0) as i32)
        .collect();
    let padded_indices = Tensor::<B, 1, Int>::from_ints(padded_indices.as_slice(), &device);
    let padded = input_reshaped.select(2, padded_indices);

    let kernel_reshaped = kernel.reshape([1, 1, kernel_size]);
    let options = ConvOptions::new([1], [0], [1], 1);
    let output_reshaped = burn::tensor::module::conv1d(padded, kernel_reshaped, None, options);

    // 4. Reshape back and inverse permute
    let mut permuted_shape = [0; D];
    let mut p_idx = 0;
    for i in 0..D {
        if i != dim {
            permuted_shape[p_idx] = dims[i];
            p_idx += 1;
        }
    }
    permuted_shape[D - 1] = length;
    let output_permuted = output_reshaped.reshape(Shape::new(permuted_shape));

    let mut inv_permute_indices = [0isize; D];
    for (new_pos, &old_pos) in permute_indices.iter().enumerate() {
        inv_permute_indices[old_pos as usize] = new_pos as isize;
    }
    output_permuted.permute(inv_permute_indices)
}
