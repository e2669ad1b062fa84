//! Image filters used to build resolution pyramids.

pub mod downsample;
pub mod gaussian;
pub mod normalize;
pub mod pyramid;

pub use downsample::DownsampleFilter;
pub use gaussian::GaussianFilter;
pub use normalize::{normalize_jointly, JointStatistics};
pub use pyramid::MultiResolutionPyramid;
