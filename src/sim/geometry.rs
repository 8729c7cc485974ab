//! Planar geometry for the workcell
//!
//! Positions are plain `Vec2`s. Boxes are axis-aligned with inclusive
//! boundaries, and paths are polylines the arm travels segment by segment.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Tolerance for treating two positions as the same point
pub const POSITION_EPSILON: f32 = 1e-4;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec2,
    pub max: Vec2,
}

impl BoundingBox {
    /// Build a box from two corners in any order
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Square box of the given half-extent centred on `center`
    pub fn around(center: Vec2, half_extent: f32) -> Self {
        let half = Vec2::splat(half_extent.abs());
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// True when min <= max on both axes
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Point containment, boundary inclusive
    pub fn contains(&self, point: Vec2) -> bool {
        self.min.x <= point.x
            && point.x <= self.max.x
            && self.min.y <= point.y
            && point.y <= self.max.y
    }

    /// Box overlap, touching edges count as intersecting
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y)
    }

    /// Grow the box by `margin` on every side
    pub fn inflate(&self, margin: f32) -> Self {
        let m = Vec2::splat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Corners counter-clockwise from `min`
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }

    /// Slab test: does the segment `a -> b` touch the box?
    pub fn segment_intersects(&self, a: Vec2, b: Vec2) -> bool {
        let dir = b - a;
        let mut t_enter = 0.0f32;
        let mut t_exit = 1.0f32;

        for axis in 0..2 {
            let origin = a[axis];
            let delta = dir[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if delta.abs() < f32::EPSILON {
                // Parallel to this slab: must already be inside it
                if origin < lo || origin > hi {
                    return false;
                }
                continue;
            }

            let inv = 1.0 / delta;
            let mut t0 = (lo - origin) * inv;
            let mut t1 = (hi - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return false;
            }
        }

        true
    }

    /// Centre of cell `index` when the box is split into a grid of `cells`
    /// roughly square cells, filled row by row.
    ///
    /// Returns the box centre when `cells` is zero.
    pub fn grid_cell_center(&self, index: usize, cells: usize) -> Vec2 {
        if cells == 0 {
            return self.center();
        }
        let cols = (cells as f32).sqrt().ceil().max(1.0) as usize;
        let rows = cells.div_ceil(cols);
        let index = index.min(cells - 1);
        let (col, row) = (index % cols, index / cols);
        let cell = self.size() / Vec2::new(cols as f32, rows as f32);
        self.min + cell * Vec2::new(col as f32 + 0.5, row as f32 + 0.5)
    }
}

/// A polyline travelled by the arm
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    points: Vec<Vec2>,
}

impl Path {
    /// Straight path between two points
    pub fn direct(from: Vec2, to: Vec2) -> Self {
        Self {
            points: vec![from, to],
        }
    }

    /// Path from `from` through each waypoint to `to`
    pub fn via(from: Vec2, waypoints: &[Vec2], to: Vec2) -> Self {
        let mut points = Vec::with_capacity(waypoints.len() + 2);
        points.push(from);
        points.extend_from_slice(waypoints);
        points.push(to);
        Self { points }
    }

    pub fn start(&self) -> Vec2 {
        self.points[0]
    }

    pub fn end(&self) -> Vec2 {
        self.points[self.points.len() - 1]
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Intermediate points (excluding start and end)
    pub fn waypoints(&self) -> &[Vec2] {
        &self.points[1..self.points.len() - 1]
    }

    /// Consecutive point pairs
    pub fn segments(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        self.points.windows(2).map(|w| (w[0], w[1]))
    }

    /// Total travelled distance
    pub fn length(&self) -> f32 {
        self.segments().map(|(a, b)| a.distance(b)).sum()
    }

    /// True when start and end coincide
    pub fn is_trivial(&self) -> bool {
        self.start().distance(self.end()) < POSITION_EPSILON
    }

    /// Does any segment, swept by `clearance`, touch `bounds`?
    pub fn hits(&self, bounds: &BoundingBox, clearance: f32) -> bool {
        let inflated = bounds.inflate(clearance);
        self.segments()
            .any(|(a, b)| inflated.segment_intersects(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Vec2::ZERO, Vec2::new(10.0, 10.0))
    }

    #[test]
    fn test_contains_inside_outside_and_boundary() {
        let b = unit_box();
        assert!(b.contains(Vec2::new(5.0, 5.0)));
        assert!(!b.contains(Vec2::new(11.0, 5.0)));
        assert!(b.contains(Vec2::new(0.0, 10.0)));
    }

    #[test]
    fn test_intersects() {
        let b = unit_box();
        let overlapping = BoundingBox::new(Vec2::new(5.0, 5.0), Vec2::new(15.0, 15.0));
        let apart = BoundingBox::new(Vec2::new(20.0, 20.0), Vec2::new(30.0, 30.0));
        let touching = BoundingBox::new(Vec2::new(10.0, 0.0), Vec2::new(20.0, 10.0));
        assert!(b.intersects(&overlapping));
        assert!(!b.intersects(&apart));
        assert!(b.intersects(&touching));
    }

    #[test]
    fn test_new_normalizes_corners() {
        let b = BoundingBox::new(Vec2::new(4.0, -1.0), Vec2::new(-2.0, 3.0));
        assert!(b.is_valid());
        assert_eq!(b.min, Vec2::new(-2.0, -1.0));
        assert_eq!(b.max, Vec2::new(4.0, 3.0));
    }

    #[test]
    fn test_corners() {
        let b = BoundingBox::new(Vec2::new(1.0, 2.0), Vec2::new(3.0, 5.0));
        let corners = b.corners();
        assert_eq!(corners[0], Vec2::new(1.0, 2.0));
        assert_eq!(corners[2], Vec2::new(3.0, 5.0));
        assert!(corners.iter().all(|c| b.contains(*c)));
    }

    #[test]
    fn test_segment_crossing_box() {
        let b = BoundingBox::around(Vec2::new(5.0, 5.0), 1.0);
        assert!(b.segment_intersects(Vec2::new(0.0, 5.0), Vec2::new(10.0, 5.0)));
        assert!(b.segment_intersects(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0)));
        // Stops short of the box
        assert!(!b.segment_intersects(Vec2::new(0.0, 5.0), Vec2::new(3.0, 5.0)));
        // Passes above it
        assert!(!b.segment_intersects(Vec2::new(0.0, 8.0), Vec2::new(10.0, 8.0)));
        // Vertical segment beside it
        assert!(!b.segment_intersects(Vec2::new(7.0, 0.0), Vec2::new(7.0, 10.0)));
    }

    #[test]
    fn test_path_clearance_widens_the_sweep() {
        let obstacle = BoundingBox::around(Vec2::new(5.0, 1.5), 0.5);
        let path = Path::direct(Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert!(!path.hits(&obstacle, 0.0));
        assert!(path.hits(&obstacle, 1.0));
    }

    #[test]
    fn test_path_length_and_waypoints() {
        let path = Path::via(Vec2::ZERO, &[Vec2::new(3.0, 4.0)], Vec2::new(6.0, 0.0));
        assert!((path.length() - 10.0).abs() < 1e-5);
        assert_eq!(path.waypoints(), &[Vec2::new(3.0, 4.0)]);
        assert_eq!(path.segments().count(), 2);
        assert!(Path::direct(Vec2::ONE, Vec2::ONE).is_trivial());
    }

    #[test]
    fn test_grid_cells_stay_inside() {
        let b = unit_box();
        for cells in 1..20 {
            for i in 0..cells {
                assert!(b.contains(b.grid_cell_center(i, cells)));
            }
        }
        assert_eq!(b.grid_cell_center(0, 0), b.center());
        assert_eq!(b.grid_cell_center(0, 1), b.center());
    }

    proptest! {
        #[test]
        fn prop_box_contains_its_center(
            x in -100.0f32..100.0, y in -100.0f32..100.0,
            w in 0.0f32..50.0, h in 0.0f32..50.0,
        ) {
            let b = BoundingBox::new(Vec2::new(x, y), Vec2::new(x + w, y + h));
            prop_assert!(b.is_valid());
            prop_assert!(b.contains(b.center()));
            prop_assert!(b.intersects(&b));
        }

        #[test]
        fn prop_segment_ending_inside_box_intersects(
            sx in -50.0f32..50.0, sy in -50.0f32..50.0,
            cx in -10.0f32..10.0, cy in -10.0f32..10.0,
        ) {
            let b = BoundingBox::around(Vec2::new(cx, cy), 1.0);
            prop_assert!(b.segment_intersects(Vec2::new(sx, sy), Vec2::new(cx, cy)));
        }

        #[test]
        fn prop_segment_far_from_box_misses(
            sx in -50.0f32..50.0, ex in -50.0f32..50.0,
        ) {
            // Segment lives entirely above y = 20, box tops out at y = 1
            let b = BoundingBox::around(Vec2::ZERO, 1.0);
            prop_assert!(!b.segment_intersects(Vec2::new(sx, 20.0), Vec2::new(ex, 25.0)));
        }
    }
}
