use burn::tensor::backend::Backend;
use crate::image::Image;

/// Mean and standard deviation shared by a set of images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointStatistics {
    pub mean: f64,
    pub std_dev: f64,
}

impl JointStatistics {
    /// Statistics over all samples of all `images`.
    pub fn compute<B: Backend, const D: usize>(images: &[&Image<B, D>]) -> Self {
        let count: usize = images.iter().map(|image| image.num_samples()).sum();
        if count == 0 {
            return Self { mean: 0.0, std_dev: 0.0 };
        }
        let mean = images.iter().map(|image| image.sum()).sum::<f64>() / count as f64;
        let deviation: f64 = images.iter().map(|image| image.sum_squared_deviation(mean)).sum();
        Self {
            mean,
            std_dev: (deviation / count as f64).sqrt(),
        }
    }

    /// True if the images carry no contrast at sample precision.
    pub fn is_degenerate(&self) -> bool {
        self.std_dev <= 1e-6 * self.mean.abs().max(1.0)
    }

    /// Map an image to zero mean and unit standard deviation.
    pub fn normalize<B: Backend, const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let scale = 1.0 / self.std_dev;
        image.map_linear(scale, -self.mean * scale)
    }
}

/// Jointly normalize two images to mean 0 and standard deviation 1.
///
/// Returns `None` if both images are constant.
pub fn normalize_jointly<B: Backend, const D: usize>(
    floating: &Image<B, D>,
    reference: &Image<B, D>,
) -> Option<(Image<B, D>, Image<B, D>)> {
    let stats = JointStatistics::compute(&[floating, reference]);
    if stats.is_degenerate() {
        return None;
    }
    Some((stats.normalize(floating), stats.normalize(reference)))
}
