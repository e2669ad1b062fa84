use burn::tensor::backend::Backend;
use crate::image::Image;
use super::downsample::DownsampleFilter;
use super::gaussian::GaussianFilter;

/// Multi-resolution image pyramid.
///
/// Each coarser level is the previous one smoothed and then reduced by a
/// factor of 2 per axis (every second sample is kept). Levels are stored
/// from coarsest to finest; the last level is the input itself.
#[derive(Debug, Clone)]
pub struct MultiResolutionPyramid<B: Backend, const D: usize> {
    images: Vec<Image<B, D>>,
}

impl<B: Backend, const D: usize> MultiResolutionPyramid<B, D> {
    /// Build a pyramid with at most `levels` levels.
    ///
    /// The number of levels is reduced so that every axis of the coarsest level
    /// keeps at least `min_level_size` samples; the finest level is always
    /// present.
    ///
    /// # Arguments
    /// * `input` - The original high-resolution image.
    /// * `levels` - Requested number of levels.
    /// * `min_level_size` - Minimum number of samples per axis.
    /// * `smoothing_sigma` - Gaussian sigma (in samples) applied before each halving.
    pub fn new(input: &Image<B, D>, levels: usize, min_level_size: usize, smoothing_sigma: f64) -> Self {
        let count = Self::level_count(input.shape(), levels, min_level_size);
        let smoother = GaussianFilter::new(vec![smoothing_sigma]);
        let downsampler = DownsampleFilter::new(vec![2]);

        let mut images = Vec::with_capacity(count);
        images.push(input.clone());
        for _ in 1..count {
            let finer = images.last().unwrap_or(input);
            let coarser = downsampler.apply(&smoother.apply(finer));
            images.push(coarser);
        }
        images.reverse();
        tracing::debug!(levels = count, coarsest = ?images[0].shape(), finest = ?input.shape(), "pyramid built");
        Self { images }
    }

    /// Number of levels that fit `size` given the minimum level size.
    pub fn level_count(size: [usize; D], levels: usize, min_level_size: usize) -> usize {
        let mut count = 1;
        let mut current = size;
        while count < levels {
            let next = current.map(Self::halved);
            if next.iter().any(|&n| n < min_level_size) {
                break;
            }
            current = next;
            count += 1;
        }
        count
    }

    /// Samples left on an axis of `n` samples after one halving.
    pub fn halved(n: usize) -> usize {
        n.div_ceil(2)
    }

    /// Get image at specific level (0 is the coarsest).
    pub fn get_level(&self, level: usize) -> Option<&Image<B, D>> {
        self.images.get(level)
    }

    /// Get number of levels.
    pub fn levels(&self) -> usize {
        self.images.len()
    }

    /// Factor between the finest level and `level` (`2^(levels - 1 - level)`).
    pub fn scale_factor(&self, level: usize) -> f64 {
        let steps = self.images.len().saturating_sub(1 + level);
        (1u64 << steps) as f64
    }

    /// Drop all level buffers.
    pub fn into_levels(self) -> Vec<Image<B, D>> {
        self.images
    }
}
