//! Construction of components from plugin strings.
//!
//! A plugin string has the form `name` or `name:key=value,key=value`, e.g.
//! `ssd:weight=1.0` or `spline:rate=8`. The [`PluginRegistry`] maps names to
//! constructors; it is created explicitly and passed to whoever needs it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use mireg_core::interpolation::{BoundaryMode, InterpolationKind, ResamplingConfig};
use mireg_core::transform::{DenseFieldFactory, SplineConfig, SplineFactory, SplinePenalty};
use mireg_core::TransformationFactory;
use crate::config::{GdasConfig, LbfgsConfig, RegularizerModel, SorConfig};
use crate::cost::{CostTermFactory, NccFactory, SsdFactory};
use crate::error::{RegistrationError, Result};
use crate::minimizer::{Gdas, Lbfgs, Minimizer};
use crate::regularizer::{NavierSor, VectorFieldRegularizer};
use crate::validation::{validate_gdas, validate_lbfgs, validate_positive};

/// A parsed plugin string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    name: String,
    params: BTreeMap<String, String>,
}

impl PluginSpec {
    /// Parse `name[:key=value[,key=value...]]`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (name, rest) = match text.split_once(':') {
            Some((name, rest)) => (name.trim(), Some(rest)),
            None => (text, None),
        };
        if name.is_empty() {
            return Err(RegistrationError::configuration(format!(
                "plugin string '{text}' has no name"
            )));
        }

        let mut params = BTreeMap::new();
        for pair in rest.into_iter().flat_map(|r| r.split(',')) {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((key, value)) = pair.split_once('=') else {
                return Err(RegistrationError::configuration(format!(
                    "'{name}': parameter '{pair}' is not of the form key=value"
                )));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(RegistrationError::configuration(format!(
                    "'{name}': parameter '{pair}' has no key"
                )));
            }
            if params.insert(key.to_string(), value.trim().to_string()).is_some() {
                return Err(RegistrationError::configuration(format!(
                    "'{name}': parameter '{key}' given twice"
                )));
            }
        }

        Ok(Self {
            name: name.to_string(),
            params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    fn reader(&self) -> Params<'_> {
        Params {
            spec: self,
            used: BTreeSet::new(),
        }
    }
}

impl fmt::Display for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            f.write_str(if i == 0 { ":" } else { "," })?;
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Typed access to the parameters of a spec; unread keys are rejected by
/// [`Params::finish`].
pub struct Params<'a> {
    spec: &'a PluginSpec,
    used: BTreeSet<&'a str>,
}

impl<'a> Params<'a> {
    /// Parse `key`, or return `default` if it is absent.
    pub fn get<T: FromStr>(&mut self, key: &'a str, default: T) -> Result<T> {
        self.used.insert(key);
        match self.spec.params.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| {
                RegistrationError::configuration(format!(
                    "'{}': cannot parse {key}='{raw}'",
                    self.spec.name
                ))
            }),
        }
    }

    /// Look `key` up with a name-based parser.
    pub fn get_named<T>(&mut self, key: &'a str, default: T, parse: impl Fn(&str) -> Option<T>) -> Result<T> {
        self.used.insert(key);
        match self.spec.params.get(key) {
            None => Ok(default),
            Some(raw) => parse(raw).ok_or_else(|| {
                RegistrationError::configuration(format!(
                    "'{}': unknown value {key}='{raw}'",
                    self.spec.name
                ))
            }),
        }
    }

    /// Fail on any parameter that was never read.
    pub fn finish(self) -> Result<()> {
        let unknown: Vec<&str> = self
            .spec
            .params
            .keys()
            .map(String::as_str)
            .filter(|k| !self.used.contains(k))
            .collect();
        if !unknown.is_empty() {
            return Err(RegistrationError::configuration(format!(
                "'{}': unknown parameter(s) {}",
                self.spec.name,
                unknown.join(", ")
            )));
        }
        Ok(())
    }
}

type CostConstructor<const D: usize> =
    Box<dyn Fn(&mut Params<'_>) -> Result<Arc<dyn CostTermFactory<D>>> + Send + Sync>;
type TransformationConstructor<const D: usize> =
    Box<dyn Fn(&mut Params<'_>) -> Result<Arc<dyn TransformationFactory<D>>> + Send + Sync>;
type MinimizerConstructor = Box<dyn Fn(&mut Params<'_>) -> Result<Box<dyn Minimizer>> + Send + Sync>;
type RegularizerConstructor<const D: usize> =
    Box<dyn Fn(&mut Params<'_>) -> Result<Box<dyn VectorFieldRegularizer<D>>> + Send + Sync>;

/// Name-to-constructor maps for every pluggable component.
pub struct PluginRegistry<const D: usize> {
    costs: BTreeMap<String, CostConstructor<D>>,
    transformations: BTreeMap<String, TransformationConstructor<D>>,
    minimizers: BTreeMap<String, MinimizerConstructor>,
    regularizers: BTreeMap<String, RegularizerConstructor<D>>,
}

impl<const D: usize> fmt::Debug for PluginRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("costs", &self.costs.keys().collect::<Vec<_>>())
            .field("transformations", &self.transformations.keys().collect::<Vec<_>>())
            .field("minimizers", &self.minimizers.keys().collect::<Vec<_>>())
            .field("regularizers", &self.regularizers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<const D: usize> Default for PluginRegistry<D> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn resampling(params: &mut Params<'_>) -> Result<ResamplingConfig> {
    let defaults = ResamplingConfig::default();
    Ok(ResamplingConfig::default()
        .with_interpolation(params.get_named("interp", defaults.interpolation, InterpolationKind::from_name)?)
        .with_boundary(params.get_named("boundary", defaults.boundary, BoundaryMode::from_name)?)
        .with_fill_value(params.get("fill", defaults.fill_value)?))
}

fn sor(params: &mut Params<'_>, model: RegularizerModel) -> Result<SorConfig> {
    let d = SorConfig::default();
    Ok(SorConfig::default()
        .with_lame(params.get("mu", d.mu)?, params.get("lambda", d.lambda)?)
        .with_omega(params.get("omega", d.omega)?)
        .with_epsilon(params.get("epsilon", d.epsilon)?)
        .with_max_iterations(params.get("maxiter", d.max_iterations)?)
        .with_divergence_window(params.get("window", d.divergence_window)?)
        .with_model(model))
}

impl<const D: usize> PluginRegistry<D> {
    /// A registry without any entries.
    pub fn empty() -> Self {
        Self {
            costs: BTreeMap::new(),
            transformations: BTreeMap::new(),
            minimizers: BTreeMap::new(),
            regularizers: BTreeMap::new(),
        }
    }

    /// Registry with the built-in components: cost terms `ssd` and `ncc`,
    /// transformations `spline` and `vf`, minimizers `gdas` and `lbfgs`, and
    /// regularizers `fluid` and `elastic`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        registry.register_cost("ssd", |p| Ok(Arc::new(SsdFactory::new(p.get("weight", 1.0)?)?)));
        registry.register_cost("ncc", |p| Ok(Arc::new(NccFactory::new(p.get("weight", 1.0)?)?)));

        registry.register_transformation("spline", |p| {
            let d = SplineConfig::default();
            let mut energy = p.get_named("energy", d.penalty, SplinePenalty::from_name)?;
            if let SplinePenalty::DivCurl { divergence, rotation } = &mut energy {
                *divergence = p.get("div", *divergence)?;
                *rotation = p.get("rot", *rotation)?;
            }
            let config = SplineConfig::default()
                .with_rate(p.get("rate", d.rate)?)
                .with_penalty(p.get("penalty", d.penalty_weight)?, energy);
            config
                .validate()
                .map_err(|e| RegistrationError::configuration(e.to_string()))?;
            Ok(Arc::new(SplineFactory::new(config, resampling(p)?)))
        });
        registry.register_transformation("vf", |p| Ok(Arc::new(DenseFieldFactory::new(resampling(p)?))));

        registry.register_minimizer("gdas", |p| {
            let d = GdasConfig::default();
            let config = GdasConfig::default()
                .with_steps(p.get("minstep", d.min_step)?, p.get("maxstep", d.max_step)?)
                .with_xtol(p.get("xtol", d.xtol)?)
                .with_ftolr(p.get("ftolr", d.ftolr)?)
                .with_max_iterations(p.get("maxiter", d.max_iterations)?)
                .with_max_tries(p.get("maxtries", d.max_tries)?);
            validate_gdas(&config)?;
            Ok(Box::new(Gdas::new(config)))
        });
        registry.register_minimizer("lbfgs", |p| {
            let d = LbfgsConfig::default();
            let config = LbfgsConfig::default()
                .with_history_size(p.get("history", d.history_size)?)
                .with_tolerances(p.get("gtol", d.gtol)?, p.get("ftolr", d.ftolr)?)
                .with_max_iterations(p.get("maxiter", d.max_iterations)?)
                .with_max_halvings(p.get("maxhalvings", d.max_halvings)?);
            validate_lbfgs(&config)?;
            let step = p.get("step", 1.0)?;
            validate_positive("step", step)?;
            Ok(Box::new(Lbfgs::new(config).with_initial_step(step)))
        });

        registry.register_regularizer("fluid", |p| {
            Ok(Box::new(NavierSor::<D>::new(sor(p, RegularizerModel::Fluid)?)?))
        });
        registry.register_regularizer("elastic", |p| {
            Ok(Box::new(NavierSor::<D>::new(sor(p, RegularizerModel::Elastic)?)?))
        });

        registry
    }

    pub fn register_cost(
        &mut self,
        name: &str,
        constructor: impl Fn(&mut Params<'_>) -> Result<Arc<dyn CostTermFactory<D>>> + Send + Sync + 'static,
    ) {
        self.costs.insert(name.to_string(), Box::new(constructor));
    }

    pub fn register_transformation(
        &mut self,
        name: &str,
        constructor: impl Fn(&mut Params<'_>) -> Result<Arc<dyn TransformationFactory<D>>> + Send + Sync + 'static,
    ) {
        self.transformations.insert(name.to_string(), Box::new(constructor));
    }

    pub fn register_minimizer(
        &mut self,
        name: &str,
        constructor: impl Fn(&mut Params<'_>) -> Result<Box<dyn Minimizer>> + Send + Sync + 'static,
    ) {
        self.minimizers.insert(name.to_string(), Box::new(constructor));
    }

    pub fn register_regularizer(
        &mut self,
        name: &str,
        constructor: impl Fn(&mut Params<'_>) -> Result<Box<dyn VectorFieldRegularizer<D>>> + Send + Sync + 'static,
    ) {
        self.regularizers.insert(name.to_string(), Box::new(constructor));
    }

    pub fn cost_names(&self) -> impl Iterator<Item = &str> {
        self.costs.keys().map(String::as_str)
    }

    pub fn transformation_names(&self) -> impl Iterator<Item = &str> {
        self.transformations.keys().map(String::as_str)
    }

    pub fn minimizer_names(&self) -> impl Iterator<Item = &str> {
        self.minimizers.keys().map(String::as_str)
    }

    pub fn regularizer_names(&self) -> impl Iterator<Item = &str> {
        self.regularizers.keys().map(String::as_str)
    }

    pub fn create_cost(&self, text: &str) -> Result<Arc<dyn CostTermFactory<D>>> {
        build(&self.costs, "cost term", text)
    }

    pub fn create_transformation(&self, text: &str) -> Result<Arc<dyn TransformationFactory<D>>> {
        build(&self.transformations, "transformation", text)
    }

    pub fn create_minimizer(&self, text: &str) -> Result<Box<dyn Minimizer>> {
        build(&self.minimizers, "minimizer", text)
    }

    pub fn create_regularizer(&self, text: &str) -> Result<Box<dyn VectorFieldRegularizer<D>>> {
        build(&self.regularizers, "regularizer", text)
    }
}

fn build<T>(
    constructors: &BTreeMap<String, Box<dyn Fn(&mut Params<'_>) -> Result<T> + Send + Sync>>,
    kind: &str,
    text: &str,
) -> Result<T> {
    let spec = PluginSpec::parse(text)?;
    let constructor = constructors.get(spec.name()).ok_or_else(|| {
        RegistrationError::configuration(format!(
            "unknown {kind} '{}' (known: {})",
            spec.name(),
            constructors.keys().cloned().collect::<Vec<_>>().join(", ")
        ))
    })?;
    let mut params = spec.reader();
    let value = constructor(&mut params)?;
    params.finish()?;
    tracing::debug!(%spec, kind, "plugin created");
    Ok(value)
}
