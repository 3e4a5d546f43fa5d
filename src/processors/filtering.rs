//! Axis-aligned cuboid slicing of point clouds.

use thiserror::Error;

use crate::core::loaders::PointCloud;

/// Errors raised when building a cuboid.
#[derive(Debug, Error, PartialEq)]
pub enum CuboidError {
    #[error("{axis} bounds are inverted: min {min} > max {max}")]
    InvertedBounds { axis: char, min: f32, max: f32 },

    #[error("{axis} bounds must be numbers")]
    NotANumber { axis: char },
}

/// Closed interval `[min, max]` on one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f32,
    pub max: f32,
}

impl AxisRange {
    #[inline]
    pub fn contains(&self, v: f32) -> bool {
        self.min <= v && v <= self.max
    }
}

/// Axis-aligned box with inclusive bounds on every side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingCuboid {
    x: AxisRange,
    y: AxisRange,
    z: AxisRange,
}

impl BoundingCuboid {
    /// Build a cuboid, checking `min <= max` on every axis.
    pub fn new(x: AxisRange, y: AxisRange, z: AxisRange) -> Result<Self, CuboidError> {
        for (axis, range) in [('x', x), ('y', y), ('z', z)] {
            if range.min.is_nan() || range.max.is_nan() {
                return Err(CuboidError::NotANumber { axis });
            }
            if range.min > range.max {
                return Err(CuboidError::InvertedBounds {
                    axis,
                    min: range.min,
                    max: range.max,
                });
            }
        }
        Ok(Self { x, y, z })
    }

    pub fn x(&self) -> AxisRange {
        self.x
    }

    pub fn y(&self) -> AxisRange {
        self.y
    }

    pub fn z(&self) -> AxisRange {
        self.z
    }

    /// True if the point lies inside the cuboid or on its boundary.
    ///
    /// NaN coordinates are never inside.
    #[inline]
    pub fn contains(&self, point: [f32; 3]) -> bool {
        self.x.contains(point[0]) && self.y.contains(point[1]) && self.z.contains(point[2])
    }

    /// Keep the points inside the cuboid, in their original order.
    pub fn filter(&self, cloud: &PointCloud) -> PointCloud {
        cloud.iter().filter(|&p| self.contains(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn range(min: f32, max: f32) -> AxisRange {
        AxisRange { min, max }
    }

    fn unit_box() -> BoundingCuboid {
        BoundingCuboid::new(range(0.0, 10.0), range(0.0, 10.0), range(0.0, 10.0)).unwrap()
    }

    #[test]
    fn test_filter_keeps_boundary_and_order() {
        let cloud: PointCloud = vec![
            [0.0, 0.0, 0.0],
            [10.0, 10.0, 10.0],
            [10.01, 5.0, 5.0],
            [5.0, 5.0, 5.0],
        ]
        .into_iter()
        .collect();

        let sliced = unit_box().filter(&cloud);

        assert_eq!(
            sliced.to_coords(),
            vec![[0.0, 0.0, 0.0], [10.0, 10.0, 10.0], [5.0, 5.0, 5.0]]
        );
    }

    #[test]
    fn test_adjacent_outside_points_are_all_removed() {
        // consecutive rejects must each be evaluated
        let cloud: PointCloud = vec![
            [-1.0, 0.0, 0.0],
            [11.0, 0.0, 0.0],
            [0.0, -1.0, 0.0],
            [1.0, 1.0, 1.0],
            [0.0, 0.0, 11.0],
        ]
        .into_iter()
        .collect();

        assert_eq!(unit_box().filter(&cloud).to_coords(), vec![[1.0, 1.0, 1.0]]);
    }

    #[test]
    fn test_filter_empty_cloud() {
        assert!(unit_box().filter(&PointCloud::new()).is_empty());
    }

    #[test]
    fn test_nan_is_outside() {
        assert!(!unit_box().contains([f32::NAN, 1.0, 1.0]));
    }

    #[test]
    fn test_degenerate_cuboid() {
        let flat = BoundingCuboid::new(range(1.0, 1.0), range(0.0, 5.0), range(0.0, 5.0)).unwrap();
        assert!(flat.contains([1.0, 2.0, 3.0]));
        assert!(!flat.contains([1.0001, 2.0, 3.0]));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let err = BoundingCuboid::new(range(0.0, 1.0), range(3.0, 2.0), range(0.0, 1.0)).unwrap_err();
        assert_eq!(
            err,
            CuboidError::InvertedBounds {
                axis: 'y',
                min: 3.0,
                max: 2.0
            }
        );
        assert!(BoundingCuboid::new(range(f32::NAN, 1.0), range(0.0, 1.0), range(0.0, 1.0)).is_err());
    }

    proptest! {
        #[test]
        fn contains_matches_per_axis_bounds(
            p in (-20.0f32..20.0, -20.0f32..20.0, -20.0f32..20.0),
            lo in (-10.0f32..0.0, -10.0f32..0.0, -10.0f32..0.0),
            span in (0.0f32..15.0, 0.0f32..15.0, 0.0f32..15.0),
        ) {
            let cuboid = BoundingCuboid::new(
                range(lo.0, lo.0 + span.0),
                range(lo.1, lo.1 + span.1),
                range(lo.2, lo.2 + span.2),
            ).unwrap();
            let point = [p.0, p.1, p.2];

            let expected = lo.0 <= p.0 && p.0 <= lo.0 + span.0
                && lo.1 <= p.1 && p.1 <= lo.1 + span.1
                && lo.2 <= p.2 && p.2 <= lo.2 + span.2;
            prop_assert_eq!(cuboid.contains(point), expected);
        }

        #[test]
        fn filter_is_an_ordered_subsequence(
            pts in prop::collection::vec((-20.0f32..20.0, -20.0f32..20.0, -20.0f32..20.0), 0..200),
        ) {
            let cloud: PointCloud = pts.iter().map(|p| [p.0, p.1, p.2]).collect();
            let cuboid = unit_box();
            let sliced = cuboid.filter(&cloud);

            let expected: Vec<[f32; 3]> = cloud.iter().filter(|&p| cuboid.contains(p)).collect();
            prop_assert_eq!(sliced.to_coords(), expected);
        }
    }
}
