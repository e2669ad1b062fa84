//! Generic minimizers over a flat parameter vector.

mod gdas;
mod lbfgs;
mod trait_;

pub use gdas::Gdas;
pub use lbfgs::Lbfgs;
pub use trait_::{
    Minimizer, MinimizerReport, MinimizerStatus, Problem, StepControl, StepMonitor, Unmonitored,
};

pub(crate) use trait_::{dot, ensure_finite, max_abs};
