//! Image types.
//!
//! [`Image`] is the backend-resident boundary type exchanged with I/O and the
//! pyramid filters. [`ScalarField`] and [`VectorField`] are host buffers on a
//! [`Grid`], used by the per-pixel kernels of the registration loop.

pub mod image;
pub mod grid;
pub mod field;

pub use image::Image;
pub use grid::Grid;
pub use field::{ScalarField, VectorField};
