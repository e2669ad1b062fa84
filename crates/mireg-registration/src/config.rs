//! Numeric configuration for the registration driver and its components.
//!
//! Every struct has stable defaults and `with_*` builders, and can be
//! (de)serialized with serde.

use serde::{Deserialize, Serialize};

/// Resolution pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PyramidConfig {
    /// Requested number of levels (reduced if the image is too small).
    pub levels: usize,
    /// Minimum number of samples per axis on the coarsest level.
    pub min_level_size: usize,
    /// Gaussian sigma in samples, applied before each halving.
    pub smoothing_sigma: f64,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            levels: 3,
            min_level_size: 16,
            smoothing_sigma: 1.0,
        }
    }
}

impl PyramidConfig {
    pub fn with_levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_min_level_size(mut self, size: usize) -> Self {
        self.min_level_size = size;
        self
    }

    pub fn with_smoothing_sigma(mut self, sigma: f64) -> Self {
        self.smoothing_sigma = sigma;
        self
    }
}

/// Per-level optimization budget and convergence test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Optimizer iteration budget per level.
    pub max_iterations: usize,
    /// Number of cost values the convergence tracker keeps.
    pub convergence_window: usize,
    /// Relative change below which successive costs count as converged.
    pub convergence_threshold: f64,
    /// Rescale step sizes and penalties with the level's spacing ratio.
    pub rescale_with_spacing: bool,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            convergence_window: 5,
            convergence_threshold: 1e-5,
            rescale_with_spacing: true,
        }
    }
}

impl LevelConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_convergence(mut self, window: usize, threshold: f64) -> Self {
        self.convergence_window = window;
        self.convergence_threshold = threshold;
        self
    }

    pub fn with_rescale_with_spacing(mut self, rescale: bool) -> Self {
        self.rescale_with_spacing = rescale;
        self
    }
}

/// Time-stepping model of the Navier regularizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegularizerModel {
    /// Each solve starts from zero.
    #[default]
    Fluid,
    /// Each solve starts from the previous solution.
    Elastic,
}

/// Successive over-relaxation of the Navier operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SorConfig {
    /// Shear modulus.
    pub mu: f64,
    /// First Lamé coefficient.
    pub lambda: f64,
    /// Relaxation factor in (0, 2).
    pub omega: f64,
    /// Stop once the largest per-point change of a sweep falls below this.
    pub epsilon: f64,
    pub max_iterations: usize,
    /// Consecutive residual increases that count as divergence.
    pub divergence_window: usize,
    pub model: RegularizerModel,
}

impl Default for SorConfig {
    fn default() -> Self {
        Self {
            mu: 1.0,
            lambda: 1.0,
            omega: 1.0,
            epsilon: 1e-3,
            max_iterations: 200,
            divergence_window: 5,
            model: RegularizerModel::Fluid,
        }
    }
}

impl SorConfig {
    pub fn with_lame(mut self, mu: f64, lambda: f64) -> Self {
        self.mu = mu;
        self.lambda = lambda;
        self
    }

    pub fn with_omega(mut self, omega: f64) -> Self {
        self.omega = omega;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_divergence_window(mut self, window: usize) -> Self {
        self.divergence_window = window;
        self
    }

    pub fn with_model(mut self, model: RegularizerModel) -> Self {
        self.model = model;
        self
    }
}

/// Gradient descent with adaptive step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GdasConfig {
    /// Smallest step (max-norm of a parameter update).
    pub min_step: f64,
    /// Largest step; also half of it is the initial step.
    pub max_step: f64,
    /// Stop when the gradient's max-norm falls below this.
    pub xtol: f64,
    /// Stop when the relative improvement of an accepted step falls below this.
    pub ftolr: f64,
    pub max_iterations: usize,
    /// Failed steps tolerated at the minimum step size.
    pub max_tries: usize,
}

impl Default for GdasConfig {
    fn default() -> Self {
        Self {
            min_step: 0.1,
            max_step: 2.0,
            xtol: 1e-6,
            ftolr: 0.0,
            max_iterations: 200,
            max_tries: 5,
        }
    }
}

impl GdasConfig {
    pub fn with_steps(mut self, min_step: f64, max_step: f64) -> Self {
        self.min_step = min_step;
        self.max_step = max_step;
        self
    }

    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    pub fn with_ftolr(mut self, ftolr: f64) -> Self {
        self.ftolr = ftolr;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_tries(mut self, max_tries: usize) -> Self {
        self.max_tries = max_tries;
        self
    }
}

/// Limited-memory BFGS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LbfgsConfig {
    /// Number of correction pairs kept.
    pub history_size: usize,
    /// Stop when the gradient's max-norm falls below this.
    pub gtol: f64,
    /// Stop when the relative improvement of an accepted step falls below this.
    pub ftolr: f64,
    pub max_iterations: usize,
    /// Step halvings allowed per line search.
    pub max_halvings: usize,
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        Self {
            history_size: 10,
            gtol: 1e-6,
            ftolr: 1e-9,
            max_iterations: 200,
            max_halvings: 20,
        }
    }
}

impl LbfgsConfig {
    pub fn with_history_size(mut self, history_size: usize) -> Self {
        self.history_size = history_size;
        self
    }

    pub fn with_tolerances(mut self, gtol: f64, ftolr: f64) -> Self {
        self.gtol = gtol;
        self.ftolr = ftolr;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_halvings(mut self, max_halvings: usize) -> Self {
        self.max_halvings = max_halvings;
        self
    }
}

/// Settings of a whole registration run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub pyramid: PyramidConfig,
    pub level: LevelConfig,
    /// Jointly normalize both images to mean 0 and standard deviation 1.
    pub normalize_intensities: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            pyramid: PyramidConfig::default(),
            level: LevelConfig::default(),
            normalize_intensities: true,
        }
    }
}

impl RegistrationConfig {
    pub fn with_pyramid(mut self, pyramid: PyramidConfig) -> Self {
        self.pyramid = pyramid;
        self
    }

    pub fn with_level(mut self, level: LevelConfig) -> Self {
        self.level = level;
        self
    }

    pub fn with_normalize_intensities(mut self, normalize: bool) -> Self {
        self.normalize_intensities = normalize;
        self
    }
}
