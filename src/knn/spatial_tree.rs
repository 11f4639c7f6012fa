//! Balanced binary space-partitioning tree over a [`DataSet`].
//!
//! Each node stores one point and the feature axis it splits on. Points with
//! `feature[axis] < node.feature[axis]` live in the left subtree, all others in
//! the right. Searches descend with an explicit stack of visited nodes and
//! backtrack from it, so nodes never point back at their parents.

use super::distance::euclidean_distance;
use super::nearest_set::BoundedNearestSet;
use crate::common_types::{DataPoint, DataSet};
use crate::error::{Error, Result};
use crate::stats;
use log::debug;
use serde::{Deserialize, Serialize};

/// How the split axis is chosen at each level of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisSelection {
    /// Axis with the largest population variance over the current subset;
    /// the lowest index wins ties.
    #[default]
    MaxVariance,
    /// `(parent_axis + 1) % dimension`, starting at 0 for the root.
    RoundRobin,
}

/// Which side of its parent a node hangs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Root,
    Left,
    Right,
}

#[derive(Debug)]
pub struct TreeNode {
    point: DataPoint,
    split_axis: usize,
    side: Side,
    left: Option<Box<TreeNode>>,
    right: Option<Box<TreeNode>>,
}

impl TreeNode {
    pub fn point(&self) -> &DataPoint {
        &self.point
    }

    pub fn split_axis(&self) -> usize {
        self.split_axis
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn left(&self) -> Option<&TreeNode> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&TreeNode> {
        self.right.as_deref()
    }

    fn split_value(&self) -> f64 {
        self.point.features()[self.split_axis]
    }

    /// Child on the query's side of the splitting hyperplane.
    fn near_child(&self, target: &[f64]) -> Option<&TreeNode> {
        if target[self.split_axis] < self.split_value() { self.left() } else { self.right() }
    }

    fn far_child(&self, target: &[f64]) -> Option<&TreeNode> {
        if target[self.split_axis] < self.split_value() { self.right() } else { self.left() }
    }

    /// Perpendicular distance from `target` to this node's splitting hyperplane.
    fn hyperplane_distance(&self, target: &[f64]) -> f64 {
        (target[self.split_axis] - self.split_value()).abs()
    }

    fn depth(&self) -> usize {
        1 + self.left().map_or(0, TreeNode::depth).max(self.right().map_or(0, TreeNode::depth))
    }
}

/// The single closest point returned by [`SpatialTree::find_nearest`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'a> {
    pub point: &'a DataPoint,
    pub distance: f64,
}

#[derive(Debug)]
pub struct SpatialTree {
    root: Option<Box<TreeNode>>,
    dimension: usize,
    len: usize,
}

impl SpatialTree {
    /// Builds the tree, moving every point of `dataset` into a node.
    ///
    /// At each step the point holding the median of the chosen axis (sorted
    /// position `n / 2`) becomes the node; the rest split into `< median`
    /// (left) and `>= median` (right). An empty dataset gives an empty tree.
    pub fn build(dataset: DataSet, axis_selection: AxisSelection) -> Self {
        let dimension = dataset.dimension();
        let len = dataset.len();
        let root = Self::build_recursive(dataset, axis_selection, None, Side::Root);
        let tree = SpatialTree { root, dimension, len };
        debug!(
            "built spatial tree: {} points, dimension {}, depth {}, {:?}",
            len,
            dimension,
            tree.depth(),
            axis_selection
        );
        tree
    }

    fn build_recursive(
        dataset: DataSet,
        axis_selection: AxisSelection,
        parent_axis: Option<usize>,
        side: Side,
    ) -> Option<Box<TreeNode>> {
        if dataset.is_empty() {
            return None;
        }
        let dimension = dataset.dimension();

        let split_axis = match axis_selection {
            AxisSelection::MaxVariance => Self::max_variance_axis(&dataset),
            AxisSelection::RoundRobin => parent_axis.map_or(0, |axis| (axis + 1) % dimension),
        };

        let median = stats::median(&dataset.column(split_axis))?;
        let mut points = dataset.into_instances();
        // `remove` keeps the remaining points in input order, which the
        // median tie-break in the subtrees relies on.
        let node_point = points.remove(median.index);

        let (left_points, right_points): (Vec<DataPoint>, Vec<DataPoint>) = points
            .into_iter()
            .partition(|p| p.features()[split_axis] < median.value);

        let left = Self::build_recursive(
            DataSet::from_checked(dimension, left_points),
            axis_selection,
            Some(split_axis),
            Side::Left,
        );
        let right = Self::build_recursive(
            DataSet::from_checked(dimension, right_points),
            axis_selection,
            Some(split_axis),
            Side::Right,
        );

        Some(Box::new(TreeNode { point: node_point, split_axis, side, left, right }))
    }

    fn max_variance_axis(dataset: &DataSet) -> usize {
        let mut split_axis = 0;
        let mut max_variance = f64::NEG_INFINITY;
        for axis in 0..dataset.dimension() {
            if let Some(variance) = stats::variance(&dataset.column(axis)) {
                if variance > max_variance {
                    max_variance = variance;
                    split_axis = axis;
                }
            }
        }
        split_axis
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of levels; 0 for an empty tree.
    pub fn depth(&self) -> usize {
        self.root().map_or(0, TreeNode::depth)
    }

    fn checked_root(&self, query: &DataPoint) -> Result<&TreeNode> {
        let root = self.root().ok_or(Error::EmptyIndex)?;
        if query.dimension() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                got: query.dimension(),
            });
        }
        if !query.is_finite() {
            return Err(Error::invalid(format!(
                "query features must be finite, got {:?}",
                query.features()
            )));
        }
        Ok(root)
    }

    /// Walks from `node` towards the query's cell, pushing every node passed.
    ///
    /// With `stop_on_match`, returns the first node whose point equals the
    /// query (label ignored) without pushing it.
    fn descend<'a>(
        mut node: &'a TreeNode,
        query: &DataPoint,
        stack: &mut Vec<&'a TreeNode>,
        stop_on_match: bool,
    ) -> Option<&'a TreeNode> {
        loop {
            if stop_on_match && node.point.eq_ignoring_label(query) {
                return Some(node);
            }
            stack.push(node);
            match node.near_child(query.features()) {
                Some(child) => node = child,
                None => return None,
            }
        }
    }

    /// The stored point closest to `query` by Euclidean distance.
    ///
    /// A query equal (label ignored) to a stored point returns that point
    /// as soon as it is reached, at distance 0.
    pub fn find_nearest(&self, query: &DataPoint) -> Result<Neighbor<'_>> {
        let root = self.checked_root(query)?;
        let target = query.features();
        let mut stack = Vec::new();

        if let Some(hit) = Self::descend(root, query, &mut stack, true) {
            return Ok(Neighbor { point: &hit.point, distance: 0.0 });
        }

        let mut best: Option<Neighbor<'_>> = None;
        while let Some(node) = stack.pop() {
            let distance = euclidean_distance(target, node.point.features())?;
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(Neighbor { point: &node.point, distance });
            }
            let best_distance = best.map_or(f64::INFINITY, |b| b.distance);
            if best_distance > node.hyperplane_distance(target) {
                if let Some(sibling) = node.far_child(target) {
                    if let Some(hit) = Self::descend(sibling, query, &mut stack, true) {
                        return Ok(Neighbor { point: &hit.point, distance: 0.0 });
                    }
                }
            }
        }
        best.ok_or(Error::EmptyIndex)
    }

    /// The `k` stored points closest to `query` by Euclidean distance.
    ///
    /// Points equal to the query are not skipped; callers doing
    /// leave-one-out filter them from the result. Stored rows with equal
    /// values are distinct entries, so `k == len()` returns every row.
    pub fn find_k_nearest(
        &self,
        query: &DataPoint,
        k: usize,
    ) -> Result<BoundedNearestSet<&DataPoint>> {
        let root = self.checked_root(query)?;
        if k == 0 {
            return Err(Error::invalid("k must be greater than 0"));
        }
        if k > self.len {
            return Err(Error::InsufficientPopulation { requested: k, population: self.len });
        }

        let target = query.features();
        let mut nearest = BoundedNearestSet::new(k)?;
        let mut stack = Vec::new();
        Self::descend(root, query, &mut stack, false);

        while let Some(node) = stack.pop() {
            let distance = euclidean_distance(target, node.point.features())?;
            // Every node is visited once, so each stored point is offered once
            // even when two rows hold equal values.
            let _ = nearest.add_distinct(&node.point, distance)?;
            // A set that is not yet full admits anything, so it never prunes.
            let search_sibling =
                !nearest.is_full() || node.hyperplane_distance(target) < nearest.max_distance()?;
            if search_sibling {
                if let Some(sibling) = node.far_child(target) {
                    Self::descend(sibling, query, &mut stack, false);
                }
            }
        }
        Ok(nearest)
    }
}
