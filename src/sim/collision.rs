//! Path collision detection and rerouting
//!
//! A path collides when any of its segments, swept by the arm's clearance,
//! touches the footprint of an object the arm is not holding, whether it
//! still sits in the source area or has already been sorted into a zone.
//! When that happens the arm gets exactly one alternate path from a
//! [`ReroutePlanner`].

use std::fmt;

use glam::Vec2;
use pathfinding::prelude::astar;

use super::geometry::{BoundingBox, Path};
use super::registry::ObjectRegistry;
use super::state::ObjectId;

/// Outward nudge applied to footprint corners used as detour waypoints
const CORNER_MARGIN: f32 = 0.05;

/// Footprints a path leaving `start` must stay out of, widened by `clearance`.
///
/// `ignore` is the operation's own target. An object whose own box contains
/// `start` is skipped: the arm is above it. A neighbour that is only within
/// clearance of `start` keeps its bare box, so the arm can move away from it
/// but not across it.
pub fn swept_footprints(
    start: Vec2,
    registry: &ObjectRegistry,
    ignore: Option<ObjectId>,
    clearance: f32,
) -> impl Iterator<Item = (ObjectId, BoundingBox)> + '_ {
    registry.obstacles(ignore).filter_map(move |(id, bounds)| {
        if bounds.contains(start) {
            return None;
        }
        let swept = bounds.inflate(clearance);
        Some((id, if swept.contains(start) { bounds } else { swept }))
    })
}

/// First obstacle the path runs into, if any
pub fn first_collision(
    path: &Path,
    registry: &ObjectRegistry,
    ignore: Option<ObjectId>,
    clearance: f32,
) -> Option<ObjectId> {
    swept_footprints(path.start(), registry, ignore, clearance)
        .find(|(_, footprint)| path.hits(footprint, 0.0))
        .map(|(id, _)| id)
}

/// Does the path run into any obstacle?
pub fn path_collides(path: &Path, registry: &ObjectRegistry, ignore: Option<ObjectId>, clearance: f32) -> bool {
    first_collision(path, registry, ignore, clearance).is_some()
}

/// Strategy for computing one alternate path around a blocked one
pub trait ReroutePlanner: fmt::Debug {
    /// Propose a path from `blocked.start()` to `blocked.end()` that differs
    /// from `blocked` and for which `is_clear` holds, or `None`.
    ///
    /// `footprints` are the swept obstacle boxes the path has to avoid, as
    /// returned by [`swept_footprints`].
    fn alternative(&self, blocked: &Path, footprints: &[BoundingBox], is_clear: &dyn Fn(&Path) -> bool) -> Option<Path>;
}

/// Never finds an alternate path
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReroute;

impl ReroutePlanner for NoReroute {
    fn alternative(&self, _blocked: &Path, _footprints: &[BoundingBox], _is_clear: &dyn Fn(&Path) -> bool) -> Option<Path> {
        None
    }
}

/// Offset detours perpendicular to the blocked path.
///
/// Candidates, in order:
/// 1. one waypoint offset sideways at several fractions along the path
/// 2. two waypoints offset at 30% and 70%
/// 3. lift-traverse-lower: offset straight out from the start, across, and
///    straight back in to the end
/// 4. the shortest route through the outer corners of the nearest
///    footprints, for destinations walled in on the near side
#[derive(Debug, Clone)]
pub struct DetourPlanner {
    /// Sideways offsets to try, nearest first
    pub offsets: Vec<f32>,
    /// Fractions along the path for single-waypoint detours
    pub fractions: Vec<f32>,
    /// Footprints considered by the corner search, nearest to the blocked path first
    pub corner_limit: usize,
}

impl Default for DetourPlanner {
    fn default() -> Self {
        Self {
            offsets: vec![2.0, 3.0, 4.0, 5.0, 6.0, 8.0],
            fractions: vec![0.2, 0.33, 0.5, 0.67, 0.8],
            corner_limit: 48,
        }
    }
}

impl DetourPlanner {
    fn candidates(&self, start: Vec2, end: Vec2) -> Vec<Vec<Vec2>> {
        let delta = end - start;
        let perp = delta.normalize_or_zero().perp();
        let mut out = Vec::new();

        for &offset in &self.offsets {
            for side in [1.0, -1.0] {
                let shift = perp * offset * side;
                for &fraction in &self.fractions {
                    out.push(vec![start + delta * fraction + shift]);
                }
            }
        }

        for &offset in &self.offsets {
            for side in [1.0, -1.0] {
                let shift = perp * offset * side;
                out.push(vec![start + delta * 0.3 + shift, start + delta * 0.7 + shift]);
            }
        }

        for &offset in &self.offsets {
            for side in [1.0, -1.0] {
                let shift = perp * offset * side;
                out.push(vec![start + shift, end + shift]);
            }
        }

        out
    }

    fn nearest(&self, footprints: &[BoundingBox], start: Vec2, end: Vec2) -> Vec<BoundingBox> {
        let mut nearby = footprints.to_vec();
        nearby.sort_by(|a, b| {
            distance_to_segment(a.center(), start, end).total_cmp(&distance_to_segment(b.center(), start, end))
        });
        nearby.truncate(self.corner_limit);
        nearby
    }
}

impl ReroutePlanner for DetourPlanner {
    fn alternative(&self, blocked: &Path, footprints: &[BoundingBox], is_clear: &dyn Fn(&Path) -> bool) -> Option<Path> {
        if blocked.is_trivial() {
            return None;
        }
        let (start, end) = (blocked.start(), blocked.end());
        let usable = |candidate: &Path| candidate != blocked && is_clear(candidate);

        let offset = self
            .candidates(start, end)
            .into_iter()
            .map(|waypoints| Path::via(start, &waypoints, end))
            .find(|candidate| usable(candidate));
        if offset.is_some() {
            return offset;
        }

        let waypoints = corner_route(start, end, &self.nearest(footprints, start, end))?;
        Some(Path::via(start, &waypoints, end)).filter(|candidate| usable(candidate))
    }
}

fn distance_to_segment(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    let t = if len_sq > 0.0 {
        ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    point.distance(a + ab * t)
}

/// Shortest polyline from `start` to `end` that stays out of every
/// footprint, turning only at footprint corners.
///
/// Returns the intermediate waypoints, or `None` when `end` cannot be
/// reached this way.
fn corner_route(start: Vec2, end: Vec2, footprints: &[BoundingBox]) -> Option<Vec<Vec2>> {
    let blocked_point = |p: Vec2| footprints.iter().any(|f| f.contains(p));
    if blocked_point(start) || blocked_point(end) {
        return None;
    }

    // Node 0 is the start, node 1 the end
    let mut nodes = vec![start, end];
    for footprint in footprints {
        let corners = footprint.inflate(CORNER_MARGIN).corners();
        nodes.extend(corners.into_iter().filter(|&c| !blocked_point(c)));
    }
    let clear = |a: Vec2, b: Vec2| !footprints.iter().any(|f| f.segment_intersects(a, b));

    // Costs scaled to integers for the search
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cost = |a: Vec2, b: Vec2| (a.distance(b) * 1000.0).round() as u64;

    let (route, _) = astar(
        &0usize,
        |&from| {
            (0..nodes.len())
                .filter(|&to| to != from && clear(nodes[from], nodes[to]))
                .map(|to| (to, cost(nodes[from], nodes[to])))
                .collect::<Vec<_>>()
        },
        |&at| cost(nodes[at], end),
        |&at| at == 1,
    )?;

    Some(route[1..route.len() - 1].iter().map(|&i| nodes[i]).collect())
}
