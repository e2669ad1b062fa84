//! Interpolation types and operations.
//!
//! This module provides interpolation kernels, boundary policies and the
//! resampling configuration used by transformations.

pub mod boundary;
pub mod bspline;
pub mod kernel;
pub mod linear;
pub mod nearest;
pub mod prefilter;
pub mod trait_;

pub use boundary::BoundaryMode;
pub use bspline::BSplineInterpolator;
pub use kernel::{cubic_bspline_weights, for_each_tap};
pub use linear::LinearInterpolator;
pub use nearest::NearestNeighborInterpolator;
pub use trait_::{InterpolationKind, Interpolator, ResamplingConfig};
