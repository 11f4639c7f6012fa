//! Nearest-centroid (Rocchio) classifier used as a fitness evaluator.

use crate::common_types::DataPoint;
use crate::error::{Error, Result};
use crate::fitness::{FitnessEvaluator, SelectedFeatures, Sampling};
use crate::knn::DistanceMetric;
use log::{debug, info};
use std::collections::BTreeMap;

/// Classifies each instance by the closest per-label mean vector.
///
/// Centroids are computed from the whole dataset, the instance being
/// classified included.
#[derive(Debug, Clone)]
pub struct RocchioEvaluator {
    selected: SelectedFeatures,
    metric: DistanceMetric,
}

impl RocchioEvaluator {
    pub fn new(selected: SelectedFeatures, metric: DistanceMetric) -> Self {
        RocchioEvaluator { selected, metric }
    }

    /// One centroid per label, ordered by label with unlabeled first.
    pub fn centroids(&self) -> Vec<DataPoint> {
        let dimension = self.selected.dataset().dimension();
        let mut sums: BTreeMap<Option<&str>, (Vec<f64>, usize)> = BTreeMap::new();
        for point in self.selected.dataset() {
            let (sum, count) =
                sums.entry(point.label()).or_insert_with(|| (vec![0.0; dimension], 0));
            for (total, value) in sum.iter_mut().zip(point.features()) {
                *total += value;
            }
            *count += 1;
        }

        sums.into_iter()
            .map(|(label, (sum, count))| {
                let mean = sum.into_iter().map(|total| total / count as f64).collect();
                DataPoint::new(label.map(str::to_string), mean)
            })
            .collect()
    }

    /// Label of the centroid closest to `point`; the first centroid wins ties.
    pub fn classify<'c>(
        &self,
        point: &DataPoint,
        centroids: &'c [DataPoint],
    ) -> Result<Option<&'c str>> {
        let mut best: Option<(&'c DataPoint, f64)> = None;
        for centroid in centroids {
            let distance = self.metric.distance(point.features(), centroid.features())?;
            if best.map_or(true, |(_, min)| distance < min) {
                best = Some((centroid, distance));
            }
        }
        best.map(|(centroid, _)| centroid.label())
            .ok_or_else(|| Error::invalid("no centroids to classify against"))
    }
}

impl FitnessEvaluator for RocchioEvaluator {
    fn accuracy(&self, sampling: Sampling) -> Result<f64> {
        if sampling != Sampling::Full {
            return Err(Error::invalid("sampling is not supported by the centroid classifier"));
        }
        let population = self.selected.num_instances();
        if population == 0 {
            return Err(Error::invalid("cannot classify an empty dataset"));
        }

        let centroids = self.centroids();
        debug!("{} centroids over {} instances", centroids.len(), population);

        let mut correct = 0usize;
        for point in self.selected.dataset() {
            if self.classify(point, &centroids)? == point.label() {
                correct += 1;
            }
        }

        let accuracy = correct as f64 / population as f64;
        info!(
            "accuracy = {:.6}, using Rocchio ({:?}) on {} instances",
            accuracy, self.metric, population
        );
        Ok(accuracy)
    }

    fn selected(&self) -> &SelectedFeatures {
        &self.selected
    }
}
