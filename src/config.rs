//! Search and evaluation settings, loadable from TOML.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```toml
//! [bpso]
//! iterations = 50
//! seed = 42
//!
//! [fitness]
//! classifier = "knn"
//! k = 3
//! strategy = "kd_tree"
//! sampling = { sample = 200 }
//! ```

use crate::error::{Error, Result};
use crate::fitness::Sampling;
use crate::knn::{AxisSelection, DistanceMetric, SearchStrategy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which classifier scores a feature subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    #[default]
    Knn,
    /// Nearest class centroid.
    Rocchio,
}

/// Binary particle swarm parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BpsoParams {
    pub iterations: usize,
    pub particles: usize,
    /// Weight of the previous velocity.
    pub inertia: f64,
    /// Pull towards the particle's own best position.
    pub cognitive: f64,
    /// Pull towards the swarm's best position.
    pub social: f64,
    pub seed: Option<u64>,
}

impl Default for BpsoParams {
    fn default() -> Self {
        BpsoParams {
            iterations: 20,
            particles: 10,
            inertia: 1.2,
            cognitive: 1.49,
            social: 1.49,
            seed: None,
        }
    }
}

impl BpsoParams {
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::Config("bpso.iterations must be greater than 0".to_string()));
        }
        if self.particles == 0 {
            return Err(Error::Config("bpso.particles must be greater than 0".to_string()));
        }
        let coefficients =
            [("inertia", self.inertia), ("cognitive", self.cognitive), ("social", self.social)];
        for (name, value) in coefficients {
            if !value.is_finite() {
                return Err(Error::Config(format!("bpso.{} must be finite, got {}", name, value)));
            }
        }
        Ok(())
    }
}

/// How a feature subset is scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Weight of classification accuracy.
    pub alpha: f64,
    /// Weight of the fraction of features dropped.
    pub beta: f64,
    pub classifier: ClassifierKind,
    /// Neighbors per vote (k-NN only).
    pub k: usize,
    pub metric: DistanceMetric,
    pub strategy: SearchStrategy,
    pub axis_selection: AxisSelection,
    pub sampling: Sampling,
    pub sample_seed: Option<u64>,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        FitnessConfig {
            alpha: 0.85,
            beta: 0.15,
            classifier: ClassifierKind::Knn,
            k: 5,
            metric: DistanceMetric::Euclidean,
            strategy: SearchStrategy::KdTree,
            axis_selection: AxisSelection::MaxVariance,
            sampling: Sampling::Full,
            sample_seed: None,
        }
    }
}

impl FitnessConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) || !(0.0..=1.0).contains(&self.beta) {
            return Err(Error::Config(format!(
                "fitness.alpha and fitness.beta must be between 0.0 and 1.0, got {} and {}",
                self.alpha, self.beta
            )));
        }
        if self.k == 0 {
            return Err(Error::Config("fitness.k must be greater than 0".to_string()));
        }
        if self.classifier == ClassifierKind::Knn
            && self.strategy == SearchStrategy::KdTree
            && self.metric != DistanceMetric::Euclidean
        {
            return Err(Error::Config("kd_tree search requires the euclidean metric".to_string()));
        }
        if self.sampling == Sampling::Sample(0) {
            return Err(Error::Config(
                "fitness.sampling must sample at least one instance".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration for a feature selection run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub bpso: BpsoParams,
    pub fitness: FitnessConfig,
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        self.bpso.validate()?;
        self.fitness.validate()
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file. A missing file yields the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents).map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SearchConfig::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn load_or_default(optional_path: Option<&Path>) -> Result<Self> {
        match optional_path {
            Some(path) => Self::load_from_file(path),
            None => Ok(SearchConfig::default()),
        }
    }
}
