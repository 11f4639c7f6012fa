//! Distance and similarity between two feature vectors of equal length.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

fn check_lengths(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch { expected: a.len(), got: b.len() });
    }
    Ok(())
}

/// Calculates the dot product of two vectors.
fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Calculates the magnitude (L2 norm) of a vector.
fn magnitude(vec: &[f64]) -> f64 {
    vec.iter().map(|x| x * x).sum::<f64>().sqrt()
}

pub fn euclidean_distance(a: &[f64], b: &[f64]) -> Result<f64> {
    check_lengths(a, b)?;
    let sum_sq_diff: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum();
    Ok(sum_sq_diff.sqrt())
}

/// Cosine of the angle between `a` and `b`; larger means closer.
///
/// With `already_normalized` the vectors are taken to be unit length and only
/// the dot product is computed. A zero vector has no direction: two zero
/// vectors count as identical (1.0), one zero vector as orthogonal (0.0).
pub fn cosine_similarity(a: &[f64], b: &[f64], already_normalized: bool) -> Result<f64> {
    check_lengths(a, b)?;
    let dot = dot_product(a, b);
    if already_normalized {
        return Ok(dot);
    }
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return Ok(if mag_a == mag_b { 1.0 } else { 0.0 });
    }
    Ok(dot / (mag_a * mag_b))
}

/// Metric used by the brute-force search and the centroid classifier.
///
/// The spatial tree always measures Euclidean distance: its hyperplane bound
/// does not hold for the cosine metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    /// `1 - cosine_similarity`, clamped to `[0, 2]`.
    Cosine,
}

impl DistanceMetric {
    /// Non-negative distance where smaller means closer.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> Result<f64> {
        match self {
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::Cosine => {
                let similarity = cosine_similarity(a, b, false)?;
                // Clamp to guard against floating point drift outside [-1, 1].
                Ok(1.0 - similarity.clamp(-1.0, 1.0))
            }
        }
    }
}
