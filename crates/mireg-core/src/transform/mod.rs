//! Transformation types and operations.
//!
//! This module provides the transformation trait and the two families used
//! by registration: cubic B-spline deformations and dense displacement fields.

pub mod dense_field;
pub mod spline;
pub mod trait_;

pub use dense_field::{DenseFieldFactory, DenseFieldTransformation};
pub use spline::{knot_intervals, SplineConfig, SplineFactory, SplinePenalty, SplineTransformation};
pub use trait_::{Transformation, TransformationFactory};
