//! Labeled points, fixed-dimension datasets, and feature masks.

use crate::error::{Error, Result};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A single labeled instance: an optional class label and a feature vector.
///
/// Points are immutable once built. Equality and hashing cover both the
/// label and the features; floats are compared by total order so that the
/// two stay consistent (`-0.0` equals `0.0`, `NaN` equals `NaN`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPoint {
    label: Option<String>,
    features: Vec<f64>,
}

impl DataPoint {
    pub fn new(label: Option<String>, features: Vec<f64>) -> Self {
        DataPoint { label, features }
    }

    pub fn labeled(label: impl Into<String>, features: Vec<f64>) -> Self {
        DataPoint { label: Some(label.into()), features }
    }

    pub fn unlabeled(features: Vec<f64>) -> Self {
        DataPoint { label: None, features }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn dimension(&self) -> usize {
        self.features.len()
    }

    /// True when no feature is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.features.iter().all(|x| x.is_finite())
    }

    /// Compares feature vectors only. The tree uses this to recognize a
    /// query point that is already stored in it.
    pub fn eq_ignoring_label(&self, other: &DataPoint) -> bool {
        self.features.len() == other.features.len()
            && self
                .features
                .iter()
                .zip(other.features.iter())
                .all(|(&a, &b)| OrderedFloat(a) == OrderedFloat(b))
    }

    /// Projects this point onto the features selected by `mask`.
    fn project(&self, mask: &FeatureMask) -> DataPoint {
        let features = self
            .features
            .iter()
            .zip(mask.bits.iter())
            .filter(|(_, selected)| **selected)
            .map(|(&value, _)| value)
            .collect();
        DataPoint { label: self.label.clone(), features }
    }
}

impl PartialEq for DataPoint {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.eq_ignoring_label(other)
    }
}

impl Eq for DataPoint {}

impl Hash for DataPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label.hash(state);
        self.features.len().hash(state);
        for &value in &self.features {
            OrderedFloat(value).hash(state);
        }
    }
}

/// An appendable collection of points that all share one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    dimension: usize,
    instances: Vec<DataPoint>,
}

impl DataSet {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::invalid("dataset dimension must be greater than 0"));
        }
        Ok(DataSet { dimension, instances: Vec::new() })
    }

    /// Builds a dataset from `points`, rejecting any point whose feature
    /// count differs from `dimension` or that holds a non-finite feature.
    pub fn from_points(
        dimension: usize,
        points: impl IntoIterator<Item = DataPoint>,
    ) -> Result<Self> {
        let mut dataset = DataSet::new(dimension)?;
        dataset.extend(points)?;
        Ok(dataset)
    }

    pub fn add_instance(&mut self, instance: DataPoint) -> Result<()> {
        if instance.dimension() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                got: instance.dimension(),
            });
        }
        if !instance.is_finite() {
            return Err(Error::invalid(format!(
                "features must be finite, got {:?}",
                instance.features()
            )));
        }
        self.instances.push(instance);
        Ok(())
    }

    /// Wraps points already known to share `dimension` and hold finite
    /// features, such as a subset of another dataset's instances.
    pub(crate) fn from_checked(dimension: usize, instances: Vec<DataPoint>) -> Self {
        DataSet { dimension, instances }
    }

    pub fn extend(&mut self, points: impl IntoIterator<Item = DataPoint>) -> Result<()> {
        for point in points {
            self.add_instance(point)?;
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Deep copy of the instance at `index`.
    pub fn get_instance(&self, index: usize) -> Option<DataPoint> {
        self.instances.get(index).cloned()
    }

    /// Borrowed view of the instance at `index`, no copy made.
    pub fn instance(&self, index: usize) -> Option<&DataPoint> {
        self.instances.get(index)
    }

    pub fn instances(&self) -> &[DataPoint] {
        &self.instances
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataPoint> {
        self.instances.iter()
    }

    pub fn into_instances(self) -> Vec<DataPoint> {
        self.instances
    }

    /// Values of one feature across all instances, in instance order.
    pub fn feature_column(&self, feature_index: usize) -> Result<Vec<f64>> {
        if feature_index >= self.dimension {
            return Err(Error::invalid(format!(
                "feature index {} out of range for dimension {}",
                feature_index, self.dimension
            )));
        }
        Ok(self.column(feature_index))
    }

    /// `feature_column` for an index already known to be in range.
    pub(crate) fn column(&self, feature_index: usize) -> Vec<f64> {
        self.instances.iter().map(|p| p.features[feature_index]).collect()
    }

    /// A new dataset holding only the features selected by `mask`.
    pub fn select_features(&self, mask: &FeatureMask) -> Result<DataSet> {
        if mask.len() != self.dimension {
            return Err(Error::DimensionMismatch { expected: self.dimension, got: mask.len() });
        }
        let selected = mask.count_selected();
        if selected == 0 {
            return Err(Error::invalid("feature mask selects no features"));
        }
        Ok(DataSet {
            dimension: selected,
            instances: self.instances.iter().map(|p| p.project(mask)).collect(),
        })
    }
}

impl<'a> IntoIterator for &'a DataSet {
    type Item = &'a DataPoint;
    type IntoIter = std::slice::Iter<'a, DataPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.iter()
    }
}

/// One bit per original feature; set bits are kept by `DataSet::select_features`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureMask {
    bits: Vec<bool>,
}

impl FeatureMask {
    pub fn from_bits(bits: Vec<bool>) -> Self {
        FeatureMask { bits }
    }

    /// Mask keeping every one of `dimension` features.
    pub fn all(dimension: usize) -> Self {
        FeatureMask { bits: vec![true; dimension] }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn is_selected(&self, feature_index: usize) -> bool {
        self.bits.get(feature_index).copied().unwrap_or(false)
    }

    pub fn count_selected(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn selected_indices(&self) -> Vec<usize> {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| if b { Some(i) } else { None })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn point(label: &str, features: Vec<f64>) -> DataPoint {
        DataPoint::labeled(label, features)
    }

    #[test]
    fn test_equality_covers_label_and_features() {
        let a = point("spam", vec![1.0, 2.0]);
        let b = point("ham", vec![1.0, 2.0]);
        assert_ne!(a, b);
        assert!(a.eq_ignoring_label(&b));
        assert_eq!(a, point("spam", vec![1.0, 2.0]));
        assert!(!a.eq_ignoring_label(&point("spam", vec![1.0, 2.5])));
    }

    #[test]
    fn test_hash_consistent_with_equality() {
        let mut set = HashSet::new();
        set.insert(DataPoint::unlabeled(vec![0.0, 1.0]));
        assert!(set.contains(&DataPoint::unlabeled(vec![-0.0, 1.0])));
        assert!(!set.contains(&DataPoint::labeled("x", vec![0.0, 1.0])));
    }

    #[test]
    fn test_dataset_rejects_wrong_dimension() {
        assert!(matches!(DataSet::new(0), Err(Error::InvalidArgument(_))));

        let mut dataset = DataSet::new(2).unwrap();
        dataset.add_instance(point("a", vec![1.0, 2.0])).unwrap();
        let err = dataset.add_instance(point("b", vec![1.0])).unwrap_err();
        assert_eq!(err, Error::DimensionMismatch { expected: 2, got: 1 });
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_dataset_rejects_non_finite_features() {
        let mut dataset = DataSet::new(2).unwrap();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = dataset.add_instance(point("a", vec![bad, 1.0])).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{:?}", err);
        }
        assert!(dataset.is_empty());

        let rows = vec![point("a", vec![1.0]), point("b", vec![f64::NAN]), point("c", vec![2.0])];
        assert!(DataSet::from_points(1, rows).unwrap_err().is_invalid_argument());
        assert!(!DataPoint::unlabeled(vec![0.0, f64::NAN]).is_finite());
        assert!(DataPoint::unlabeled(vec![0.0, -3.5]).is_finite());
    }

    #[test]
    fn test_get_instance_is_a_copy() {
        let dataset = DataSet::from_points(2, vec![point("a", vec![1.0, 2.0])]).unwrap();
        let copy = dataset.get_instance(0).unwrap();
        assert_eq!(&copy, dataset.instance(0).unwrap());
        assert!(dataset.get_instance(1).is_none());
    }

    #[test]
    fn test_feature_column() {
        let dataset = DataSet::from_points(
            2,
            vec![
                point("a", vec![1.0, 10.0]),
                point("b", vec![2.0, 20.0]),
                point("c", vec![3.0, 30.0]),
            ],
        )
        .unwrap();
        assert_eq!(dataset.feature_column(1).unwrap(), vec![10.0, 20.0, 30.0]);
        assert!(dataset.feature_column(2).is_err());
    }

    #[test]
    fn test_select_features() {
        let dataset = DataSet::from_points(
            3,
            vec![point("a", vec![1.0, 2.0, 3.0]), point("b", vec![4.0, 5.0, 6.0])],
        )
        .unwrap();
        let mask = FeatureMask::from_bits(vec![true, false, true]);
        assert_eq!(mask.selected_indices(), vec![0, 2]);

        let selected = dataset.select_features(&mask).unwrap();
        assert_eq!(selected.dimension(), 2);
        assert_eq!(selected.instance(1).unwrap(), &point("b", vec![4.0, 6.0]));

        let nothing = FeatureMask::from_bits(vec![false; 3]);
        assert!(matches!(dataset.select_features(&nothing), Err(Error::InvalidArgument(_))));

        let short = FeatureMask::all(2);
        assert_eq!(
            dataset.select_features(&short).unwrap_err(),
            Error::DimensionMismatch { expected: 3, got: 2 }
        );
    }
}
