//! Image model, interpolation and transformations for non-rigid registration.
//!
//! Images live on a burn backend; per-sample kernels that need random access
//! (resampling, spline projection) run on host-side [`ScalarField`] and
//! [`VectorField`] buffers extracted once per pyramid level.

pub mod error;
pub mod filter;
pub mod image;
pub mod interpolation;
pub mod spatial;
pub mod transform;

pub use error::{CoreError, Result};
pub use image::{Grid, Image, ScalarField, VectorField};
pub use interpolation::{Interpolator, ResamplingConfig};
pub use spatial::{Point, Spacing, Vector};
pub use transform::{Transformation, TransformationFactory};
