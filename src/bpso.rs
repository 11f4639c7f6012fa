//! Binary particle swarm search over feature masks.
//!
//! Each particle is a bit vector; bit `i` set means feature `i` is kept.
//! Velocities live in `(0, 1)` after a sigmoid and give the probability that
//! the matching bit is set on the next move.

use crate::common_types::{DataSet, FeatureMask};
use crate::config::{BpsoParams, SearchConfig};
use crate::error::{Error, Result};
use crate::fitness::evaluate_mask;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::ThreadPool;
use std::sync::Arc;

/// Result of a swarm run.
#[derive(Debug, Clone, PartialEq)]
pub struct PsoOutcome {
    pub best_mask: FeatureMask,
    pub best_fitness: f64,
    /// Best fitness after each iteration.
    pub history: Vec<f64>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn bit(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// Scores one position. A failed evaluation is logged and ranks below every
/// successful one.
fn score<F>(fitness: &mut F, position: &[bool]) -> f64
where
    F: FnMut(&FeatureMask) -> Result<f64>,
{
    let mask = FeatureMask::from_bits(position.to_vec());
    match fitness(&mask) {
        Ok(value) => value,
        Err(e) => {
            warn!("evaluation of features {:?} failed: {}", mask.selected_indices(), e);
            f64::NEG_INFINITY
        }
    }
}

pub struct BinaryPso {
    params: BpsoParams,
}

impl BinaryPso {
    pub fn new(params: BpsoParams) -> Result<Self> {
        params.validate()?;
        Ok(BinaryPso { params })
    }

    pub fn params(&self) -> &BpsoParams {
        &self.params
    }

    /// Maximizes `fitness` over masks of `dimension` bits.
    pub fn run<F>(&self, dimension: usize, mut fitness: F) -> Result<PsoOutcome>
    where
        F: FnMut(&FeatureMask) -> Result<f64>,
    {
        if dimension == 0 {
            return Err(Error::invalid("cannot search an empty feature space"));
        }
        let BpsoParams { iterations, particles, inertia, cognitive, social, seed } = self.params;
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut positions: Vec<Vec<bool>> =
            (0..particles).map(|_| (0..dimension).map(|_| rng.gen_bool(0.5)).collect()).collect();
        let mut velocities: Vec<Vec<f64>> = (0..particles)
            .map(|_| (0..dimension).map(|_| rng.gen_range(0.0..1.0)).collect())
            .collect();

        let mut personal_best = positions.clone();
        let mut personal_best_fitness: Vec<f64> =
            personal_best.iter().map(|position| score(&mut fitness, position)).collect();

        let mut global_best = personal_best[0].clone();
        let mut global_best_fitness = personal_best_fitness[0];
        for (position, &value) in personal_best.iter().zip(&personal_best_fitness).skip(1) {
            if value > global_best_fitness {
                global_best = position.clone();
                global_best_fitness = value;
            }
        }
        debug!("initial swarm of {} particles, best fitness {:.6}", particles, global_best_fitness);

        let mut history = Vec::with_capacity(iterations);
        for iteration in 0..iterations {
            for j in 0..particles {
                let current = score(&mut fitness, &positions[j]);
                if current > personal_best_fitness[j] {
                    personal_best[j] = positions[j].clone();
                    personal_best_fitness[j] = current;
                    if current > global_best_fitness {
                        global_best = positions[j].clone();
                        global_best_fitness = current;
                    }
                }

                for d in 0..dimension {
                    let x = bit(positions[j][d]);
                    let r1: f64 = rng.gen_range(0.0..1.0);
                    let r2: f64 = rng.gen_range(0.0..1.0);
                    let toward_personal = cognitive * r1 * (bit(personal_best[j][d]) - x);
                    let toward_global = social * r2 * (bit(global_best[d]) - x);
                    let velocity =
                        sigmoid(inertia * velocities[j][d] + toward_personal + toward_global);
                    velocities[j][d] = velocity;
                    positions[j][d] = velocity > rng.gen_range(0.0..1.0);
                }
            }
            history.push(global_best_fitness);
            info!(
                "iteration {}: best fitness {:.6} with {} of {} features",
                iteration + 1,
                global_best_fitness,
                global_best.iter().filter(|&&b| b).count(),
                dimension
            );
        }

        Ok(PsoOutcome {
            best_mask: FeatureMask::from_bits(global_best),
            best_fitness: global_best_fitness,
            history,
        })
    }
}

/// Searches for the feature subset of `dataset` with the highest fitness
/// under `config`.
pub fn run_feature_selection(
    dataset: &DataSet,
    config: &SearchConfig,
    pool: Option<Arc<ThreadPool>>,
) -> Result<PsoOutcome> {
    config.validate()?;
    if dataset.is_empty() {
        return Err(Error::invalid("cannot select features of an empty dataset"));
    }
    info!(
        "selecting features for {} instances with {} features",
        dataset.len(),
        dataset.dimension()
    );
    let swarm = BinaryPso::new(config.bpso.clone())?;
    swarm.run(dataset.dimension(), |mask| {
        evaluate_mask(dataset, mask, &config.fitness, pool.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_types::DataPoint;
    use approx::assert_abs_diff_eq;
    use rayon::ThreadPoolBuilder;

    fn seeded(seed: u64) -> BpsoParams {
        BpsoParams { seed: Some(seed), ..BpsoParams::default() }
    }

    fn matches_target(mask: &FeatureMask) -> Result<f64> {
        let target = [true, false, true, false, true, false];
        let hits = mask.bits().iter().zip(target).filter(|&(&b, t)| b == t).count();
        Ok(hits as f64 / target.len() as f64)
    }

    #[test]
    fn test_sigmoid() {
        assert_abs_diff_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_history_tracks_best() {
        let outcome = BinaryPso::new(seeded(7)).unwrap().run(6, matches_target).unwrap();
        assert_eq!(outcome.history.len(), 20);
        assert!(outcome.history.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(outcome.history.last().copied(), Some(outcome.best_fitness));
        assert_eq!(matches_target(&outcome.best_mask).unwrap(), outcome.best_fitness);
        assert_eq!(outcome.best_mask.len(), 6);
    }

    #[test]
    fn test_seed_reproduces_run() {
        let swarm = BinaryPso::new(seeded(42)).unwrap();
        let first = swarm.run(6, matches_target).unwrap();
        let second = swarm.run(6, matches_target).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_failed_evaluations_are_skipped() {
        let mut calls = 0usize;
        let outcome = BinaryPso::new(seeded(1))
            .unwrap()
            .run(4, |mask| {
                calls += 1;
                if calls % 2 == 0 {
                    Err(Error::invalid("flaky"))
                } else {
                    Ok(mask.count_selected() as f64)
                }
            })
            .unwrap();
        assert!(outcome.best_fitness.is_finite());
        assert_eq!(calls, 10 + 20 * 10);

        let swarm = BinaryPso::new(seeded(1)).unwrap();
        let outcome = swarm.run(4, |_| Err(Error::EmptyIndex)).unwrap();
        assert_eq!(outcome.best_fitness, f64::NEG_INFINITY);
    }

    #[test]
    fn test_invalid_inputs() {
        let swarm = BinaryPso::new(seeded(0)).unwrap();
        assert!(swarm.run(0, matches_target).unwrap_err().is_invalid_argument());

        let params = BpsoParams { particles: 0, ..BpsoParams::default() };
        assert!(matches!(BinaryPso::new(params), Err(Error::Config(_))));
    }

    #[test]
    fn test_feature_selection_finds_separating_feature() {
        let points = vec![
            DataPoint::labeled("a", vec![0.0, 5.0, 1.0]),
            DataPoint::labeled("a", vec![0.2, 1.0, 4.0]),
            DataPoint::labeled("a", vec![0.1, 3.0, 2.0]),
            DataPoint::labeled("a", vec![0.3, 2.0, 5.0]),
            DataPoint::labeled("b", vec![10.0, 4.0, 3.0]),
            DataPoint::labeled("b", vec![10.2, 2.5, 1.5]),
            DataPoint::labeled("b", vec![10.1, 5.0, 4.5]),
            DataPoint::labeled("b", vec![10.3, 1.5, 2.5]),
        ];
        let dataset = DataSet::from_points(3, points).unwrap();
        let mut config = SearchConfig::default();
        config.bpso.seed = Some(3);
        config.fitness.k = 3;

        let pool = Arc::new(ThreadPoolBuilder::new().num_threads(2).build().unwrap());
        let outcome = run_feature_selection(&dataset, &config, Some(pool)).unwrap();
        assert_eq!(outcome.best_mask.bits(), &[true, false, false]);
        assert_abs_diff_eq!(outcome.best_fitness, 0.85 + 0.15 * (2.0 / 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_feature_selection_rejects_bad_config() {
        let dataset = DataSet::from_points(1, vec![DataPoint::labeled("a", vec![1.0])]).unwrap();
        let mut config = SearchConfig::default();
        config.fitness.alpha = 2.0;
        assert!(matches!(run_feature_selection(&dataset, &config, None), Err(Error::Config(_))));

        let empty = DataSet::new(2).unwrap();
        assert!(run_feature_selection(&empty, &SearchConfig::default(), None).is_err());
    }
}
