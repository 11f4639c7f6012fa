//! Nearest-neighbor search and the k-NN fitness evaluator built on it.

pub mod distance;
pub mod nearest_set;
pub mod spatial_tree;

pub use distance::{cosine_similarity, euclidean_distance, DistanceMetric};
pub use nearest_set::{Admission, BoundedNearestSet};
pub use spatial_tree::{AxisSelection, Neighbor, Side, SpatialTree, TreeNode};

use crate::common_types::DataPoint;
use crate::error::{Error, Result};
use crate::fitness::{FitnessEvaluator, SelectedFeatures, Sampling};
use log::{debug, info};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How neighbors are found for each classified instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Distance from the query to every other instance.
    BruteForce,
    /// Spatial tree queries; Euclidean metric only.
    #[default]
    KdTree,
}

/// Picks the winning label from `(label, distance)` pairs.
///
/// Each neighbor votes with weight `1 / distance`. Neighbors at distance 0
/// outvote everything else and are counted among themselves. Equal totals go
/// to the smallest label, with unlabeled first. `None` when there are no
/// neighbors.
pub fn weighted_vote<'a>(
    neighbors: impl IntoIterator<Item = (Option<&'a str>, f64)>,
) -> Option<Option<&'a str>> {
    let mut weights: BTreeMap<Option<&'a str>, f64> = BTreeMap::new();
    let mut exact_matches: BTreeMap<Option<&'a str>, f64> = BTreeMap::new();
    for (label, distance) in neighbors {
        if distance == 0.0 {
            *exact_matches.entry(label).or_insert(0.0) += 1.0;
        } else {
            *weights.entry(label).or_insert(0.0) += 1.0 / distance;
        }
    }
    let tally = if exact_matches.is_empty() { weights } else { exact_matches };

    let mut winner: Option<(Option<&'a str>, OrderedFloat<f64>)> = None;
    for (label, weight) in tally {
        let weight = OrderedFloat(weight);
        if winner.map_or(true, |(_, best)| weight > best) {
            winner = Some((label, weight));
        }
    }
    winner.map(|(label, _)| label)
}

/// Leave-one-out k-nearest-neighbor classifier over a feature subset.
#[derive(Debug, Clone)]
pub struct KnnEvaluator {
    k: usize,
    selected: SelectedFeatures,
    metric: DistanceMetric,
    strategy: SearchStrategy,
    axis_selection: AxisSelection,
    seed: Option<u64>,
    pool: Option<Arc<ThreadPool>>,
}

impl KnnEvaluator {
    pub fn new(k: usize, selected: SelectedFeatures) -> Result<Self> {
        if k == 0 {
            return Err(Error::invalid("k must be greater than 0"));
        }
        Ok(KnnEvaluator {
            k,
            selected,
            metric: DistanceMetric::Euclidean,
            strategy: SearchStrategy::KdTree,
            axis_selection: AxisSelection::MaxVariance,
            seed: None,
            pool: None,
        })
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_axis_selection(mut self, axis_selection: AxisSelection) -> Self {
        self.axis_selection = axis_selection;
        self
    }

    /// Seed for picking sampled instances.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Classifies instances on `pool` instead of the calling thread.
    pub fn with_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    fn query_indices(&self, sampling: Sampling) -> Result<Vec<usize>> {
        let population = self.selected.num_instances();
        match sampling {
            Sampling::Full => Ok((0..population).collect()),
            Sampling::Sample(count) => {
                if count == 0 || count > population {
                    return Err(Error::invalid(format!(
                        "invalid number of samples: {} out of {}",
                        count, population
                    )));
                }
                let mut rng = match self.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                let indices = rand::seq::index::sample(&mut rng, population, count).into_vec();
                debug!("sampled instances: {:?}", indices);
                Ok(indices)
            }
        }
    }

    fn instance(&self, index: usize) -> Result<&DataPoint> {
        self.selected
            .dataset()
            .instance(index)
            .ok_or_else(|| Error::invalid(format!("instance index {} out of range", index)))
    }

    /// The k nearest stored points other than the query itself, found in
    /// the tree. Points equal to the query (label ignored) are dropped.
    fn tree_neighbors<'t>(
        &self,
        tree: &'t SpatialTree,
        index: usize,
    ) -> Result<Vec<(Option<&'t str>, f64)>> {
        let query = self.instance(index)?;
        let nearest = tree.find_k_nearest(query, self.k + 1)?;
        let mut neighbors: Vec<(Option<&'t str>, f64)> = nearest
            .into_sorted_vec()
            .into_iter()
            .filter(|(p, _)| !p.eq_ignoring_label(query))
            .map(|(p, d)| (p.label(), d))
            .collect();
        neighbors.truncate(self.k);
        Ok(neighbors)
    }

    /// The k nearest instances by exhaustive scan, skipping the query's own index.
    fn brute_force_neighbors(&self, index: usize) -> Result<Vec<(Option<&str>, f64)>> {
        let dataset = self.selected.dataset();
        let query = self.instance(index)?;
        let mut nearest = BoundedNearestSet::new(self.k)?;
        for (other_index, other) in dataset.iter().enumerate() {
            if other_index == index {
                continue;
            }
            let distance = self.metric.distance(query.features(), other.features())?;
            let _ = nearest.add_distinct(other_index, distance)?;
        }
        nearest
            .into_sorted_vec()
            .into_iter()
            .map(|(i, d)| Ok((self.instance(i)?.label(), d)))
            .collect()
    }

    /// Number of `queries` whose weighted vote matches their own label.
    fn count_correct<'n, F>(&self, queries: &[usize], neighbors_of: F) -> Result<usize>
    where
        F: Fn(usize) -> Result<Vec<(Option<&'n str>, f64)>> + Sync,
    {
        let classify = |&index: &usize| -> Result<bool> {
            let expected = self.instance(index)?.label();
            let neighbors = neighbors_of(index)?;
            Ok(weighted_vote(neighbors) == Some(expected))
        };
        let outcomes: Vec<bool> = match &self.pool {
            Some(pool) => {
                pool.install(|| queries.par_iter().map(classify).collect::<Result<Vec<bool>>>())?
            }
            None => queries.iter().map(classify).collect::<Result<Vec<bool>>>()?,
        };
        Ok(outcomes.into_iter().filter(|&correct| correct).count())
    }
}

impl FitnessEvaluator for KnnEvaluator {
    fn accuracy(&self, sampling: Sampling) -> Result<f64> {
        let population = self.selected.num_instances();
        if self.k >= population {
            return Err(Error::InsufficientPopulation { requested: self.k + 1, population });
        }
        let queries = self.query_indices(sampling)?;

        let correct = match self.strategy {
            SearchStrategy::KdTree => {
                if self.metric != DistanceMetric::Euclidean {
                    return Err(Error::invalid("kd-tree search requires the Euclidean metric"));
                }
                let tree = SpatialTree::build(self.selected.dataset().clone(), self.axis_selection);
                self.count_correct(&queries, |index| self.tree_neighbors(&tree, index))?
            }
            SearchStrategy::BruteForce => {
                self.count_correct(&queries, |index| self.brute_force_neighbors(index))?
            }
        };

        let accuracy = correct as f64 / queries.len() as f64;
        info!(
            "accuracy = {:.6}, using KNN ({:?}, k = {}) on {} of {} instances",
            accuracy,
            self.strategy,
            self.k,
            queries.len(),
            population
        );
        Ok(accuracy)
    }

    fn selected(&self) -> &SelectedFeatures {
        &self.selected
    }
}
