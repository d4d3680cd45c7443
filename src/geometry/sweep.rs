//! Visibility polygon from a point via angular sweep.
//!
//! Rays are cast toward every segment endpoint (and a hair to either side of
//! it); the nearest hit along each ray becomes a vertex of the polygon. The
//! boundary ring closes the sweep so every ray hits something.

use glam::DVec2;
use rustc_hash::FxHashSet;

use super::segment::{ray_segment_intersection, segment_intersection};

/// Angular offset for the rays cast beside each endpoint.
const SWEEP_EPSILON: f64 = 1e-5;

/// A 2D segment used as a sweep obstacle.
pub type Segment2 = (DVec2, DVec2);

/// Compute the region visible from `origin` inside `boundary`, treating
/// `segments` as opaque.
///
/// `boundary` must enclose `origin`. The returned ring is ordered by angle
/// around the origin and may be empty if the boundary is degenerate.
#[must_use]
pub fn sweep_polygon(origin: DVec2, segments: &[Segment2], boundary: &[DVec2]) -> Vec<DVec2> {
    if boundary.len() < 3 {
        return Vec::new();
    }

    let mut all_segments: Vec<Segment2> = segments.to_vec();
    let n = boundary.len();
    for i in 0..n {
        all_segments.push((boundary[i], boundary[(i + 1) % n]));
    }

    // Collect unique endpoints, plus points where obstacles cross the
    // boundary, since those are corners of the result too.
    let mut seen: FxHashSet<(u64, u64)> = FxHashSet::default();
    let mut endpoints: Vec<DVec2> = Vec::new();
    let mut push_unique = |p: DVec2, endpoints: &mut Vec<DVec2>| {
        if seen.insert((p.x.to_bits(), p.y.to_bits())) {
            endpoints.push(p);
        }
    };
    for &(a, b) in &all_segments {
        push_unique(a, &mut endpoints);
        push_unique(b, &mut endpoints);
    }
    for &(a, b) in segments {
        for i in 0..n {
            if let Some(p) = segment_intersection(a, b, boundary[i], boundary[(i + 1) % n]) {
                push_unique(p, &mut endpoints);
            }
        }
    }

    // For each endpoint, cast rays at angle and angle ± epsilon.
    let (sin_eps, cos_eps) = SWEEP_EPSILON.sin_cos();
    let mut rays: Vec<(f64, DVec2)> = Vec::with_capacity(endpoints.len() * 3);
    for p in &endpoints {
        let d = *p - origin;
        if d.length_squared() < 1e-18 {
            continue;
        }
        let dir = d.normalize();
        let angle = dir.y.atan2(dir.x);
        let neg = DVec2::new(dir.x * cos_eps + dir.y * sin_eps, -dir.x * sin_eps + dir.y * cos_eps);
        let pos = DVec2::new(dir.x * cos_eps - dir.y * sin_eps, dir.x * sin_eps + dir.y * cos_eps);
        rays.push((angle - SWEEP_EPSILON, neg));
        rays.push((angle, dir));
        rays.push((angle + SWEEP_EPSILON, pos));
    }
    rays.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    let mut result: Vec<DVec2> = Vec::with_capacity(rays.len());
    for (_, dir) in rays {
        let nearest = all_segments
            .iter()
            .filter_map(|&(a, b)| ray_segment_intersection(origin, dir, a, b))
            .fold(f64::INFINITY, f64::min);
        if nearest.is_finite() {
            let p = origin + dir * nearest;
            if result.last().is_none_or(|last: &DVec2| last.distance_squared(p) > 1e-12) {
                result.push(p);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use geo::Area;

    use super::*;
    use crate::geometry::{bounds::Bounds2, polygon::polygon_from_points};

    fn square_boundary() -> Vec<DVec2> {
        Bounds2::from_origin_size(DVec2::ZERO, DVec2::splat(10.0))
            .corners()
            .to_vec()
    }

    #[test]
    fn no_obstacles_returns_boundary() {
        let ring = sweep_polygon(DVec2::splat(5.0), &[], &square_boundary());
        let area = polygon_from_points(&ring).unsigned_area();
        assert!((area - 100.0).abs() < 1e-3, "area {area}");
    }

    #[test]
    fn wall_through_boundary_cuts_it() {
        // Vertical wall at x = 7 spanning the whole square.
        let wall = (DVec2::new(7.0, -5.0), DVec2::new(7.0, 15.0));
        let ring = sweep_polygon(DVec2::splat(5.0), &[wall], &square_boundary());
        let area = polygon_from_points(&ring).unsigned_area();
        assert!((area - 70.0).abs() < 1e-2, "area {area}");
    }

    #[test]
    fn degenerate_boundary_is_empty() {
        assert!(sweep_polygon(DVec2::ZERO, &[], &[DVec2::ZERO, DVec2::X]).is_empty());
    }
}
