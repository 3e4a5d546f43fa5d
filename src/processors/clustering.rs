//! Greedy proximity deduplication of point clouds.
//!
//! Points are visited in input order. A point is kept only if no previously
//! kept point lies closer than the closeness radius; otherwise it is dropped
//! as a near-duplicate. Candidate neighbors come from a [`SpatialIndex`] and
//! are always re-checked with the exact distance, so an index only has to
//! guarantee it never misses a true neighbor.
//!
//! # Example
//!
//! ```
//! use crane_scan::core::PointCloud;
//! use crane_scan::processors::clustering::dedupe;
//!
//! let cloud: PointCloud = vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0], [2.0, 0.0, 0.0]]
//!     .into_iter()
//!     .collect();
//! let kept = dedupe(&cloud, 1.0);
//! assert_eq!(kept.to_coords(), vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
//! ```

use std::collections::HashMap;

use kiddo::SquaredEuclidean;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::loaders::PointCloud;

/// Range-query structure over accepted points.
///
/// `candidates` must return every stored point within `radius` of `point`.
/// Returning extra points is fine; they are filtered by exact distance.
pub trait SpatialIndex {
    /// Store point `id` at `point`.
    fn insert(&mut self, id: usize, point: [f32; 3]);

    /// Ids of stored points that may lie within `radius` of `point`.
    fn candidates(&self, point: [f32; 3], radius: f32) -> Vec<usize>;
}

/// Uniform hash grid with cubic cells.
///
/// A query visits every cell that can hold a point within `radius`, so with
/// cells as wide as the closeness radius that is the 27 cells around the
/// query point.
pub struct GridIndex {
    cell: f32,
    cells: HashMap<(i64, i64, i64), Vec<(usize, [f32; 3])>>,
}

impl GridIndex {
    /// `cell` must be positive.
    pub fn new(cell: f32) -> Self {
        debug_assert!(cell > 0.0);
        Self {
            cell,
            cells: HashMap::new(),
        }
    }

    /// Cell of a point. Coordinates far outside the cell range saturate at
    /// the `i64` bounds; clamping keeps neighbors within the query span.
    #[inline]
    fn key(&self, point: [f32; 3]) -> (i64, i64, i64) {
        let cell = f64::from(self.cell);
        (
            (f64::from(point[0]) / cell).floor() as i64,
            (f64::from(point[1]) / cell).floor() as i64,
            (f64::from(point[2]) / cell).floor() as i64,
        )
    }
}

impl SpatialIndex for GridIndex {
    fn insert(&mut self, id: usize, point: [f32; 3]) {
        let key = self.key(point);
        self.cells.entry(key).or_default().push((id, point));
    }

    fn candidates(&self, point: [f32; 3], radius: f32) -> Vec<usize> {
        let span = (radius / self.cell).ceil().max(1.0) as i64;
        let (cx, cy, cz) = self.key(point);

        let mut found = Vec::new();
        for dx in -span..=span {
            for dy in -span..=span {
                for dz in -span..=span {
                    let key = (
                        cx.saturating_add(dx),
                        cy.saturating_add(dy),
                        cz.saturating_add(dz),
                    );
                    if let Some(entries) = self.cells.get(&key) {
                        found.extend(entries.iter().map(|&(id, _)| id));
                    }
                }
            }
        }
        found
    }
}

/// Leaf capacity of the KD-tree.
const TREE_BUCKET: usize = 32;

type Tree = kiddo::float::kdtree::KdTree<f32, u64, 3, TREE_BUCKET, u32>;

/// KD-tree backed index.
///
/// Queries reach `2 * radius`, the same reach as testing whether two boxes of
/// half-width `radius` around each point overlap.
///
/// kiddo cannot split a full bucket whose points all share one coordinate on
/// the split axis. The tree therefore never holds `TREE_BUCKET` points with the
/// same value on any axis; further points on such a plane go to a linear
/// overflow list, which every query also scans. Plane-heavy data degrades
/// towards a linear scan, so prefer [`GridIndex`] there.
pub struct KdTreeIndex {
    tree: Tree,
    axis_counts: [HashMap<u32, usize>; 3],
    overflow: LinearIndex,
}

impl KdTreeIndex {
    pub fn new() -> Self {
        Self {
            tree: Tree::new(),
            axis_counts: Default::default(),
            overflow: LinearIndex::new(),
        }
    }

    /// Number of points held in the overflow list.
    pub fn overflow_len(&self) -> usize {
        self.overflow.entries.len()
    }
}

/// Hash key of an axis value; `-0.0` and `0.0` compare equal in the tree.
#[inline]
fn axis_key(v: f32) -> u32 {
    if v == 0.0 {
        0.0f32.to_bits()
    } else {
        v.to_bits()
    }
}

impl Default for KdTreeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialIndex for KdTreeIndex {
    fn insert(&mut self, id: usize, point: [f32; 3]) {
        let crowded = (0..3).any(|axis| {
            self.axis_counts[axis]
                .get(&axis_key(point[axis]))
                .is_some_and(|&n| n + 1 >= TREE_BUCKET)
        });

        if crowded {
            self.overflow.insert(id, point);
            return;
        }

        for axis in 0..3 {
            *self.axis_counts[axis].entry(axis_key(point[axis])).or_default() += 1;
        }
        self.tree.add(&point, id as u64);
    }

    fn candidates(&self, point: [f32; 3], radius: f32) -> Vec<usize> {
        let reach = 2.0 * radius;
        let mut found: Vec<usize> = self
            .tree
            .within_unsorted::<SquaredEuclidean>(&point, reach * reach)
            .into_iter()
            .map(|nn| nn.item as usize)
            .collect();
        found.extend(self.overflow.candidates(point, radius));
        found
    }
}

/// Linear scan over stored points with a coarse box-overlap test.
///
/// O(n) per query; meant for small batches and as a reference for the
/// KD-tree index.
#[derive(Default)]
pub struct LinearIndex {
    entries: Vec<(usize, [f32; 3])>,
}

impl LinearIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpatialIndex for LinearIndex {
    fn insert(&mut self, id: usize, point: [f32; 3]) {
        self.entries.push((id, point));
    }

    fn candidates(&self, point: [f32; 3], radius: f32) -> Vec<usize> {
        let reach = 2.0 * radius;
        self.entries
            .iter()
            .filter(|(_, p)| (0..3).all(|axis| (p[axis] - point[axis]).abs() <= reach))
            .map(|&(id, _)| id)
            .collect()
    }
}

/// Which index backs deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    #[default]
    Grid,
    KdTree,
    Linear,
}

#[inline]
fn squared_distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Drop points closer than `radius` to an earlier kept point.
///
/// Uses a [`GridIndex`] with cells one radius wide. A radius of zero (or
/// less) keeps every point.
pub fn dedupe(cloud: &PointCloud, radius: f32) -> PointCloud {
    dedupe_using(cloud, radius, IndexKind::Grid)
}

/// [`dedupe`] with the index chosen at runtime.
pub fn dedupe_using(cloud: &PointCloud, radius: f32, kind: IndexKind) -> PointCloud {
    if radius <= 0.0 {
        return cloud.clone();
    }
    match kind {
        // cells a hair wider than the radius keep rounding in the cell key
        // from putting a true neighbor two cells away
        IndexKind::Grid => dedupe_with(cloud, radius, GridIndex::new(radius * 1.001)),
        IndexKind::KdTree => dedupe_with(cloud, radius, KdTreeIndex::new()),
        IndexKind::Linear => dedupe_with(cloud, radius, LinearIndex::new()),
    }
}

/// [`dedupe`] over a caller-provided, initially empty index.
///
/// The result is order dependent: of two points closer than `radius`, the one
/// that comes first in `cloud` survives.
pub fn dedupe_with<I: SpatialIndex>(cloud: &PointCloud, radius: f32, mut index: I) -> PointCloud {
    if radius <= 0.0 {
        return cloud.clone();
    }

    let radius_sq = radius * radius;
    let mut kept = PointCloud::with_capacity(cloud.len());

    for point in cloud.iter() {
        let crowded = index
            .candidates(point, radius)
            .into_iter()
            .any(|id| squared_distance(kept.point(id), point) < radius_sq);

        if !crowded {
            index.insert(kept.len(), point);
            kept.push(point[0], point[1], point[2]);
        }
    }

    debug!("dedupe: kept {} of {} points (radius {})", kept.len(), cloud.len(), radius);
    kept
}
