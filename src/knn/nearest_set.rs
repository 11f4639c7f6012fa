//! Fixed-capacity collector that keeps the k candidates closest to a query.

use crate::error::{Error, Result};
use log::trace;
use ordered_float::OrderedFloat;
use std::fmt::Debug;

/// Outcome of offering a candidate to a [`BoundedNearestSet`].
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Admission<P> {
    /// Stored; the set was not yet full.
    Inserted,
    /// An equal item is already stored; nothing changed.
    Duplicate,
    /// Stored in place of the returned item, which held the largest distance.
    Replaced(P),
    /// The set is full and the candidate is farther than everything kept.
    /// The candidate is handed back.
    NotAdmitted(P),
}

impl<P> Admission<P> {
    /// The item that left (or never entered) the set: the evicted entry on
    /// replacement, the candidate itself on rejection.
    pub fn into_displaced(self) -> Option<P> {
        match self {
            Admission::Replaced(p) | Admission::NotAdmitted(p) => Some(p),
            Admission::Inserted | Admission::Duplicate => None,
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Inserted | Admission::Replaced(_))
    }
}

/// Keeps at most `capacity` items, preferring smaller distances.
///
/// Entries stay in insertion order. The entry holding the largest distance
/// is tracked so that rejection is O(1); a replacement rescans the entries,
/// which is O(k).
#[derive(Debug, Clone)]
pub struct BoundedNearestSet<P> {
    capacity: usize,
    entries: Vec<(P, OrderedFloat<f64>)>,
    max_index: Option<usize>,
}

impl<P> BoundedNearestSet<P>
where
    P: PartialEq + Debug,
{
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid("bounded set capacity must be greater than 0"));
        }
        Ok(BoundedNearestSet {
            capacity,
            entries: Vec::with_capacity(capacity),
            max_index: None,
        })
    }

    /// Offers `point` at `distance`.
    ///
    /// Negative or NaN distances are rejected as invalid input. A full set
    /// admits a candidate whose distance is less than or equal to the current
    /// maximum, evicting the entry at that maximum.
    pub fn add(&mut self, point: P, distance: f64) -> Result<Admission<P>> {
        let distance = check_distance(distance)?;
        if self.contains(&point) {
            trace!("ignoring duplicated point {:?}", point);
            return Ok(Admission::Duplicate);
        }
        Ok(self.admit(point, distance))
    }

    pub fn contains(&self, point: &P) -> bool {
        self.entries.iter().any(|(p, _)| p == point)
    }
}

fn check_distance(distance: f64) -> Result<OrderedFloat<f64>> {
    if distance.is_nan() || distance < 0.0 {
        return Err(Error::invalid(format!("distance must be non-negative, got {}", distance)));
    }
    Ok(OrderedFloat(distance))
}

impl<P> BoundedNearestSet<P> {
    /// Like [`add`](Self::add) without the equality scan, for callers that
    /// offer each item at most once. Never returns `Duplicate`.
    pub fn add_distinct(&mut self, point: P, distance: f64) -> Result<Admission<P>> {
        let distance = check_distance(distance)?;
        Ok(self.admit(point, distance))
    }

    fn admit(&mut self, point: P, distance: OrderedFloat<f64>) -> Admission<P> {
        if !self.is_full() {
            self.entries.push((point, distance));
            let is_new_max = self.max_index.map_or(true, |i| distance > self.entries[i].1);
            if is_new_max {
                self.max_index = Some(self.entries.len() - 1);
            }
            return Admission::Inserted;
        }

        // A full set has at least one entry, so the maximum is known.
        let max_index = self.max_index.unwrap_or(0);
        if distance > self.entries[max_index].1 {
            return Admission::NotAdmitted(point);
        }

        let (evicted, _) = self.entries.remove(max_index);
        self.entries.push((point, distance));
        self.max_index = Self::index_of_max(&self.entries);
        Admission::Replaced(evicted)
    }

    fn index_of_max(entries: &[(P, OrderedFloat<f64>)]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, (_, d)) in entries.iter().enumerate() {
            if best.map_or(true, |b| *d > entries[b].1) {
                best = Some(i);
            }
        }
        best
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Largest distance currently kept.
    pub fn max_distance(&self) -> Result<f64> {
        self.max_index.map(|i| self.entries[i].1.0).ok_or(Error::EmptySet)
    }

    pub fn point_at_max_distance(&self) -> Option<&P> {
        self.max_index.map(|i| &self.entries[i].0)
    }

    /// Entries with their distances, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&P, f64)> + '_ {
        self.entries.iter().map(|(p, d)| (p, d.0))
    }

    pub fn points(&self) -> impl Iterator<Item = &P> + '_ {
        self.entries.iter().map(|(p, _)| p)
    }

    /// Consumes the set, returning entries by ascending distance. Equal
    /// distances keep insertion order.
    pub fn into_sorted_vec(self) -> Vec<(P, f64)> {
        let mut entries = self.entries;
        entries.sort_by_key(|(_, d)| *d);
        entries.into_iter().map(|(p, d)| (p, d.0)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_types::DataPoint;

    fn make_instance(x1: f64, x2: f64) -> DataPoint {
        DataPoint::unlabeled(vec![x1, x2])
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(BoundedNearestSet::<u32>::new(0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_size_and_capacity() {
        let mut set = BoundedNearestSet::new(3).unwrap();
        assert!(!set.is_full());
        assert_eq!(set.len(), 0);
        assert_eq!(set.capacity(), 3);

        for (i, d) in [0.1, 0.2, 0.3].into_iter().enumerate() {
            assert_eq!(set.add(make_instance(i as f64, i as f64), d).unwrap(), Admission::Inserted);
        }
        assert!(set.is_full());
        assert_eq!(set.len(), 3);

        let _ = set.add(make_instance(4.0, 4.0), 0.4).unwrap();
        assert!(set.is_full());
        assert_eq!(set.len(), 3);
        assert_eq!(set.capacity(), 3);
    }

    #[test]
    fn test_add_points_and_get_max_distance() {
        let mut set = BoundedNearestSet::new(3).unwrap();
        assert_eq!(set.max_distance(), Err(Error::EmptySet));

        assert!(set.add(make_instance(1.0, 1.0), 0.1).unwrap().into_displaced().is_none());
        assert_eq!(set.max_distance().unwrap(), 0.1);

        assert!(set.add(make_instance(3.0, 3.0), 0.3).unwrap().into_displaced().is_none());
        assert_eq!(set.max_distance().unwrap(), 0.3);

        assert!(set.add(make_instance(2.0, 2.0), 0.2).unwrap().into_displaced().is_none());
        assert_eq!(set.max_distance().unwrap(), 0.3);
        assert_eq!(set.point_at_max_distance(), Some(&make_instance(3.0, 3.0)));

        // A farther candidate is handed back.
        assert_eq!(
            set.add(make_instance(4.0, 4.0), 0.4).unwrap(),
            Admission::NotAdmitted(make_instance(4.0, 4.0))
        );
        assert_eq!(set.max_distance().unwrap(), 0.3);

        // A closer candidate evicts the current maximum.
        assert_eq!(
            set.add(make_instance(4.0, 4.0), 0.25).unwrap(),
            Admission::Replaced(make_instance(3.0, 3.0))
        );
        assert_eq!(set.max_distance().unwrap(), 0.25);
        assert_eq!(set.point_at_max_distance(), Some(&make_instance(4.0, 4.0)));
    }

    #[test]
    fn test_equal_distance_replaces_maximum() {
        let mut set = BoundedNearestSet::new(2).unwrap();
        let _ = set.add("a", 1.0).unwrap();
        let _ = set.add("b", 2.0).unwrap();
        assert_eq!(set.add("c", 2.0).unwrap(), Admission::Replaced("b"));
        assert_eq!(set.max_distance().unwrap(), 2.0);
    }

    #[test]
    fn test_duplicate_is_noop() {
        let mut set = BoundedNearestSet::new(2).unwrap();
        let _ = set.add(make_instance(1.0, 1.0), 0.5).unwrap();
        assert_eq!(set.add(make_instance(1.0, 1.0), 0.1).unwrap(), Admission::Duplicate);
        assert_eq!(set.len(), 1);
        assert_eq!(set.max_distance().unwrap(), 0.5);
    }

    #[test]
    fn test_add_distinct_keeps_equal_items() {
        let mut set = BoundedNearestSet::new(3).unwrap();
        let twin = make_instance(1.0, 1.0);
        assert_eq!(set.add_distinct(&twin, 1.0).unwrap(), Admission::Inserted);
        assert_eq!(set.add_distinct(&twin, 1.0).unwrap(), Admission::Inserted);
        assert_eq!(set.len(), 2);
        assert!(set.add_distinct(&twin, f64::NAN).is_err());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_invalid_distance() {
        let mut set = BoundedNearestSet::new(2).unwrap();
        assert!(matches!(set.add(1, -0.5), Err(Error::InvalidArgument(_))));
        assert!(matches!(set.add(1, f64::NAN), Err(Error::InvalidArgument(_))));
        assert!(set.is_empty());
    }

    #[test]
    fn test_into_sorted_vec() {
        let mut set = BoundedNearestSet::new(3).unwrap();
        for (label, d) in [("P10", 10.0), ("P5", 5.0), ("P12", 12.0), ("P4", 4.0), ("P15", 15.0)] {
            let _ = set.add(label, d).unwrap();
        }
        assert_eq!(set.max_distance().unwrap(), 10.0);
        let sorted: Vec<_> = set.into_sorted_vec().into_iter().map(|(p, _)| p).collect();
        assert_eq!(sorted, vec!["P4", "P5", "P10"]);
    }

    #[test]
    fn test_max_tracks_true_maximum_after_many_adds() {
        let mut set = BoundedNearestSet::new(4).unwrap();
        let distances = [9.0, 3.0, 7.0, 1.0, 8.0, 2.0, 6.0, 0.5, 5.0, 4.0];
        for (i, &d) in distances.iter().enumerate() {
            let _ = set.add(i, d).unwrap();
            assert!(set.len() <= set.capacity());
            let true_max = set.iter().map(|(_, d)| d).fold(f64::MIN, f64::max);
            assert_eq!(set.max_distance().unwrap(), true_max);
        }
        let kept: Vec<f64> = set.into_sorted_vec().into_iter().map(|(_, d)| d).collect();
        assert_eq!(kept, vec![0.5, 1.0, 2.0, 3.0]);
    }
}
