pub mod bpso;
pub mod common_types;
pub mod config;
pub mod error;
pub mod fitness;
pub mod knn;
pub mod rocchio;
pub mod stats;

pub use bpso::{run_feature_selection, BinaryPso, PsoOutcome};
pub use common_types::{DataPoint, DataSet, FeatureMask};
pub use config::{BpsoParams, ClassifierKind, FitnessConfig, SearchConfig};
pub use error::{Error, Result};
pub use fitness::{evaluate_mask, FitnessEvaluator, SelectedFeatures, Sampling};
pub use knn::{BoundedNearestSet, DistanceMetric, KnnEvaluator, SearchStrategy, SpatialTree};
pub use rocchio::RocchioEvaluator;

#[cfg(feature = "python")]
mod python {
    use crate::common_types::{DataPoint, DataSet, FeatureMask};
    use crate::config::{ClassifierKind, FitnessConfig, SearchConfig};
    use crate::error::Error;
    use crate::fitness::evaluate_mask;
    use crate::knn::{cosine_similarity, euclidean_distance, AxisSelection, SpatialTree};
    use crate::bpso::run_feature_selection;
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    type Row = (Vec<f64>, Option<String>);
    type NeighborRow = (Vec<f64>, Option<String>, f64);

    impl From<Error> for PyErr {
        fn from(err: Error) -> PyErr {
            if err.is_invalid_argument() {
                PyValueError::new_err(err.to_string())
            } else {
                PyRuntimeError::new_err(err.to_string())
            }
        }
    }

    /// Rows are `(features, label)` tuples; the first row fixes the dimension.
    fn to_dataset(rows: Vec<Row>) -> crate::error::Result<DataSet> {
        let dimension = rows.first().map_or(0, |(features, _)| features.len());
        let points = rows.into_iter().map(|(features, label)| DataPoint::new(label, features));
        DataSet::from_points(dimension, points)
    }

    fn to_row(point: &DataPoint, distance: f64) -> NeighborRow {
        (point.features().to_vec(), point.label().map(str::to_string), distance)
    }

    /// Calculates the Euclidean distance between two vectors of f64.
    #[pyfunction]
    fn euclidean_distance_py(a: Vec<f64>, b: Vec<f64>) -> PyResult<f64> {
        Ok(euclidean_distance(&a, &b)?)
    }

    #[pyfunction]
    #[pyo3(signature = (a, b, already_normalized = false))]
    fn cosine_similarity_py(a: Vec<f64>, b: Vec<f64>, already_normalized: bool) -> PyResult<f64> {
        Ok(cosine_similarity(&a, &b, already_normalized)?)
    }

    #[pyclass(name = "SpatialTree")]
    struct PySpatialTree {
        tree: SpatialTree,
    }

    #[pymethods]
    impl PySpatialTree {
        #[new]
        #[pyo3(signature = (points, axis_selection = String::from("max_variance")))]
        fn new(points: Vec<Row>, axis_selection: String) -> PyResult<Self> {
            let axis_selection = match axis_selection.as_str() {
                "max_variance" => AxisSelection::MaxVariance,
                "round_robin" => AxisSelection::RoundRobin,
                other => {
                    let message = format!("unknown axis selection: {}", other);
                    return Err(PyValueError::new_err(message));
                }
            };
            Ok(PySpatialTree { tree: SpatialTree::build(to_dataset(points)?, axis_selection) })
        }

        /// Same as the constructor.
        #[staticmethod]
        #[pyo3(signature = (points, axis_selection = String::from("max_variance")))]
        fn build(points: Vec<Row>, axis_selection: String) -> PyResult<Self> {
            Self::new(points, axis_selection)
        }

        fn __len__(&self) -> usize {
            self.tree.len()
        }

        fn find_nearest(&self, features: Vec<f64>) -> PyResult<NeighborRow> {
            let neighbor = self.tree.find_nearest(&DataPoint::unlabeled(features))?;
            Ok(to_row(neighbor.point, neighbor.distance))
        }

        /// Nearest `k` stored points, closest first.
        fn find_k_nearest(&self, features: Vec<f64>, k: usize) -> PyResult<Vec<NeighborRow>> {
            let nearest = self.tree.find_k_nearest(&DataPoint::unlabeled(features), k)?;
            let rows = nearest.into_sorted_vec().into_iter();
            Ok(rows.map(|(point, distance)| to_row(point, distance)).collect())
        }
    }

    #[pyfunction]
    #[pyo3(signature = (
        points,
        mask,
        k = 5,
        classifier = String::from("knn"),
        alpha = 0.85,
        beta = 0.15
    ))]
    fn evaluate_fitness(
        py: Python<'_>,
        points: Vec<Row>,
        mask: Vec<bool>,
        k: usize,
        classifier: String,
        alpha: f64,
        beta: f64,
    ) -> PyResult<f64> {
        let classifier = match classifier.as_str() {
            "knn" => ClassifierKind::Knn,
            "rocchio" => ClassifierKind::Rocchio,
            other => return Err(PyValueError::new_err(format!("unknown classifier: {}", other))),
        };
        let config = FitnessConfig { k, classifier, alpha, beta, ..FitnessConfig::default() };
        config.validate()?;
        let dataset = to_dataset(points)?;
        let mask = FeatureMask::from_bits(mask);
        Ok(py.allow_threads(|| evaluate_mask(&dataset, &mask, &config, None))?)
    }

    /// Runs the feature search; `config_toml` overrides the default settings.
    #[pyfunction]
    #[pyo3(signature = (points, config_toml = None))]
    fn run_bpso(
        py: Python<'_>,
        points: Vec<Row>,
        config_toml: Option<String>,
    ) -> PyResult<(Vec<bool>, f64, Vec<f64>)> {
        let config = match config_toml {
            Some(text) => SearchConfig::from_toml_str(&text)?,
            None => SearchConfig::default(),
        };
        let dataset = to_dataset(points)?;
        let outcome = py.allow_threads(|| run_feature_selection(&dataset, &config, None))?;
        Ok((outcome.best_mask.bits().to_vec(), outcome.best_fitness, outcome.history))
    }

    /// The name of this function must match the `lib.name` in `Cargo.toml`.
    #[pymodule]
    fn feature_select_knn(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(euclidean_distance_py, m)?)?;
        m.add_function(wrap_pyfunction!(cosine_similarity_py, m)?)?;
        m.add_function(wrap_pyfunction!(evaluate_fitness, m)?)?;
        m.add_function(wrap_pyfunction!(run_bpso, m)?)?;
        m.add_class::<PySpatialTree>()?;
        Ok(())
    }
}
