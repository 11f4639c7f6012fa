//! Column statistics used to pick and place split points in the spatial tree.

use num_traits::{Float, NumCast};
use ordered_float::OrderedFloat;
use std::iter::Sum;

/// A value together with its position in the sequence it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedValue<T> {
    pub index: usize,
    pub value: T,
}

/// Arithmetic mean. `None` for an empty slice.
pub fn mean<F>(values: &[F]) -> Option<F>
where
    F: Float + Sum<F>,
{
    if values.is_empty() {
        return None;
    }
    let sum = values.iter().cloned().sum::<F>();
    let n: F = NumCast::from(values.len())?;
    Some(sum / n)
}

/// Population variance (divides by `n`, not `n - 1`), so a single value has
/// variance zero. `None` for an empty slice.
pub fn variance<F>(values: &[F]) -> Option<F>
where
    F: Float + Sum<F>,
{
    let mean_val = mean(values)?;
    let sum_of_squared_differences = values
        .iter()
        .map(|&v| {
            let difference = v - mean_val;
            difference * difference
        })
        .sum::<F>();
    let n: F = NumCast::from(values.len())?;
    Some(sum_of_squared_differences / n)
}

/// Median of an unsorted column, returned with the index of the element that
/// produced it.
///
/// The values are sorted with a stable indexed sort and the element at sorted
/// position `n / 2` is taken, so for even `n` this is the upper of the two
/// middle elements and equal values keep their input order.
pub fn median(values: &[f64]) -> Option<IndexedValue<f64>> {
    if values.is_empty() {
        return None;
    }
    let mut indexed: Vec<IndexedValue<f64>> = values
        .iter()
        .enumerate()
        .map(|(index, &value)| IndexedValue { index, value })
        .collect();
    indexed.sort_by_key(|iv| OrderedFloat(iv.value));
    Some(indexed[values.len() / 2])
}
