//! Fitness of a feature subset: classifier accuracy traded off against the
//! number of features kept.

use crate::common_types::{DataSet, FeatureMask};
use crate::config::{ClassifierKind, FitnessConfig};
use crate::error::{Error, Result};
use crate::knn::KnnEvaluator;
use crate::rocchio::RocchioEvaluator;
use log::info;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which instances are classified when measuring accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Every instance.
    #[default]
    Full,
    /// This many distinct instances, picked at random.
    Sample(usize),
}

/// A classifier that scores the feature subset it was built on.
pub trait FitnessEvaluator {
    /// Classification accuracy in `[0, 1]` over the instances chosen by `sampling`.
    fn accuracy(&self, sampling: Sampling) -> Result<f64>;

    fn selected(&self) -> &SelectedFeatures;

    /// `alpha * accuracy + beta * (unselected features / all features)`.
    fn evaluate(&self, alpha: f64, beta: f64, sampling: Sampling) -> Result<f64> {
        let accuracy = self.accuracy(sampling)?;
        let fitness = combine(alpha, beta, accuracy, self.selected());
        info!(
            "fitness {:.6} (accuracy {:.6}, {} of {} features)",
            fitness,
            accuracy,
            self.selected().num_selected(),
            self.selected().num_features()
        );
        Ok(fitness)
    }
}

fn combine(alpha: f64, beta: f64, accuracy: f64, selected: &SelectedFeatures) -> f64 {
    let num_features = selected.num_features() as f64;
    let dropped = (selected.num_features() - selected.num_selected()) as f64;
    alpha * accuracy + beta * (dropped / num_features)
}

/// A dataset projected onto the features chosen by a mask, together with the
/// size of the original feature space.
#[derive(Debug, Clone)]
pub struct SelectedFeatures {
    dataset: DataSet,
    num_features: usize,
}

impl SelectedFeatures {
    pub fn new(original: &DataSet, mask: &FeatureMask) -> Result<Self> {
        Ok(SelectedFeatures {
            dataset: original.select_features(mask)?,
            num_features: original.dimension(),
        })
    }

    /// Keeps every feature of `dataset`.
    pub fn all(dataset: DataSet) -> Self {
        let num_features = dataset.dimension();
        SelectedFeatures { dataset, num_features }
    }

    pub fn dataset(&self) -> &DataSet {
        &self.dataset
    }

    pub fn num_instances(&self) -> usize {
        self.dataset.len()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_selected(&self) -> usize {
        self.dataset.dimension()
    }
}

/// Builds the evaluator described by `config` on the features selected by
/// `mask` and returns its fitness.
pub fn evaluate_mask(
    dataset: &DataSet,
    mask: &FeatureMask,
    config: &FitnessConfig,
    pool: Option<Arc<ThreadPool>>,
) -> Result<f64> {
    if dataset.is_empty() {
        return Err(Error::invalid("cannot evaluate a feature subset on an empty dataset"));
    }
    let selected = SelectedFeatures::new(dataset, mask)?;
    match config.classifier {
        ClassifierKind::Knn => {
            let mut evaluator = KnnEvaluator::new(config.k, selected)?
                .with_metric(config.metric)
                .with_strategy(config.strategy)
                .with_axis_selection(config.axis_selection);
            if let Some(seed) = config.sample_seed {
                evaluator = evaluator.with_seed(seed);
            }
            if let Some(pool) = pool {
                evaluator = evaluator.with_pool(pool);
            }
            evaluator.evaluate(config.alpha, config.beta, config.sampling)
        }
        ClassifierKind::Rocchio => {
            RocchioEvaluator::new(selected, config.metric).evaluate(
                config.alpha,
                config.beta,
                config.sampling,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_types::DataPoint;
    use approx::assert_abs_diff_eq;

    struct FixedAccuracy {
        accuracy: f64,
        selected: SelectedFeatures,
    }

    impl FitnessEvaluator for FixedAccuracy {
        fn accuracy(&self, _sampling: Sampling) -> Result<f64> {
            Ok(self.accuracy)
        }

        fn selected(&self) -> &SelectedFeatures {
            &self.selected
        }
    }

    fn two_cluster_dataset() -> DataSet {
        // Feature 0 separates the classes, features 1 and 2 are noise.
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
        DataSet::from_points(3, points).unwrap()
    }

    #[test]
    fn test_fitness_formula() {
        let dataset = two_cluster_dataset();
        let mask = FeatureMask::from_bits(vec![true, false, false]);
        let selected = SelectedFeatures::new(&dataset, &mask).unwrap();
        let evaluator = FixedAccuracy { accuracy: 0.8, selected };
        let fitness = evaluator.evaluate(0.85, 0.15, Sampling::Full).unwrap();
        assert_abs_diff_eq!(fitness, 0.85 * 0.8 + 0.15 * (2.0 / 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_selected_features_counts() {
        let dataset = two_cluster_dataset();
        let mask = FeatureMask::from_bits(vec![true, true, false]);
        let selected = SelectedFeatures::new(&dataset, &mask).unwrap();
        assert_eq!(selected.num_features(), 3);
        assert_eq!(selected.num_selected(), 2);
        assert_eq!(selected.num_instances(), 8);

        let all = SelectedFeatures::all(dataset);
        assert_eq!(all.num_selected(), all.num_features());
    }

    #[test]
    fn test_evaluate_mask_with_each_classifier() {
        let dataset = two_cluster_dataset();
        let mask = FeatureMask::from_bits(vec![true, false, false]);
        let expected = 0.85 + 0.15 * (2.0 / 3.0);

        let knn = FitnessConfig { k: 3, ..FitnessConfig::default() };
        let fitness = evaluate_mask(&dataset, &mask, &knn, None).unwrap();
        assert_abs_diff_eq!(fitness, expected, epsilon = 1e-12);

        let rocchio =
            FitnessConfig { classifier: ClassifierKind::Rocchio, ..FitnessConfig::default() };
        let fitness = evaluate_mask(&dataset, &mask, &rocchio, None).unwrap();
        assert_abs_diff_eq!(fitness, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_evaluate_mask_rejects_empty_selection() {
        let dataset = two_cluster_dataset();
        let mask = FeatureMask::from_bits(vec![false; 3]);
        let err = evaluate_mask(&dataset, &mask, &FitnessConfig::default(), None).unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
