use geo::{
    orient::{Direction, Orient},
    Area, BooleanOps, ConvexHull, Coord, Intersects, Line, LineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use glam::DVec2;

use super::{bounds::Bounds2, segment::orientation, EPSILON};

/// Areas below this are treated as empty.
pub const AREA_EPSILON: f64 = 1e-10;

/// Build a polygon from a ring of points (the closing point is implicit).
/// The result is oriented counter-clockwise.
#[must_use]
pub fn polygon_from_points(points: &[DVec2]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = points.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    Polygon::new(LineString::from(coords), Vec::new()).orient(Direction::Default)
}

/// Exterior ring points without the closing duplicate.
#[must_use]
pub fn polygon_points(polygon: &Polygon<f64>) -> Vec<DVec2> {
    let ring = polygon.exterior();
    let mut points: Vec<DVec2> = ring.coords().map(|c| DVec2::new(c.x, c.y)).collect();
    if points.len() > 1 && points.first() == points.last() {
        let _ = points.pop();
    }
    points
}

/// Ring with consecutive duplicate points (and a closing duplicate)
/// removed.
#[must_use]
pub fn dedup_ring(points: &[DVec2]) -> Vec<DVec2> {
    let mut ring: Vec<DVec2> = Vec::with_capacity(points.len());
    for &p in points {
        if ring.last().is_none_or(|q| q.distance_squared(p) > EPSILON * EPSILON) {
            ring.push(p);
        }
    }
    while ring.len() > 1 && ring[0].distance_squared(ring[ring.len() - 1]) <= EPSILON * EPSILON {
        let _ = ring.pop();
    }
    ring
}

/// An empty multipolygon.
#[must_use]
pub fn empty() -> MultiPolygon<f64> {
    MultiPolygon::new(Vec::new())
}

/// Returns `true` when the polygon has fewer than three distinct vertices or
/// no measurable area.
#[must_use]
pub fn is_degenerate(polygon: &Polygon<f64>) -> bool {
    dedup_ring(&polygon_points(polygon)).len() < 3 || polygon.unsigned_area() < AREA_EPSILON
}

/// Union of every polygon produced by `polygons`.
#[must_use]
pub fn union_all<I>(polygons: I) -> MultiPolygon<f64>
where
    I: IntoIterator<Item = Polygon<f64>>,
{
    polygons
        .into_iter()
        .filter(|p| !is_degenerate(p))
        .fold(empty(), |acc, p| acc.union(&MultiPolygon::new(vec![p])))
}

/// Region covered by at least two of the given polygons.
///
/// Each pair is intersected and the overlaps are unioned, which is how a
/// sightline crossing two limited walls is modeled as fully blocked.
#[must_use]
pub fn pairwise_overlap(polygons: &[MultiPolygon<f64>]) -> MultiPolygon<f64> {
    let mut overlap = empty();
    for (i, a) in polygons.iter().enumerate() {
        for b in &polygons[i + 1..] {
            let shared = a.intersection(b);
            if shared.unsigned_area() > AREA_EPSILON {
                overlap = overlap.union(&shared);
            }
        }
    }
    overlap
}

/// Intersection of a polygon with a multipolygon.
#[must_use]
pub fn clip(polygon: &Polygon<f64>, clip_to: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon.clone()]).intersection(clip_to)
}

/// Regular polygon approximating a circle.
#[must_use]
pub fn circle_points(center: DVec2, radius: f64, segments: usize) -> Vec<DVec2> {
    let n = segments.max(3);
    (0..n)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / n as f64;
            center + DVec2::new(angle.cos(), angle.sin()) * radius
        })
        .collect()
}

/// Convex hull of every vertex in a multipolygon.
#[must_use]
pub fn convex_hull(shapes: &MultiPolygon<f64>) -> Polygon<f64> {
    let points: Vec<Point<f64>> = shapes
        .iter()
        .flat_map(|p| p.exterior().points())
        .collect();
    MultiPoint::new(points).convex_hull().orient(Direction::Default)
}

/// Collapse a multipolygon to a single polygon: the sole member if there is
/// one, the convex hull when there are several, `None` when empty.
#[must_use]
pub fn single_polygon(shapes: &MultiPolygon<f64>) -> Option<Polygon<f64>> {
    match shapes.0.len() {
        0 => None,
        1 => Some(shapes.0[0].clone()),
        _ => Some(convex_hull(shapes)),
    }
}

/// Boundary-inclusive point containment.
#[must_use]
pub fn contains_point(polygon: &Polygon<f64>, p: DVec2) -> bool {
    polygon.intersects(&Point::new(p.x, p.y))
}

/// Returns `true` if the segment crosses the polygon or has an endpoint
/// inside it.
#[must_use]
pub fn intersects_segment(polygon: &Polygon<f64>, a: DVec2, b: DVec2) -> bool {
    polygon.intersects(&Line::new(Coord { x: a.x, y: a.y }, Coord { x: b.x, y: b.y }))
}

/// Returns `true` if the two polygons share any area or boundary.
#[must_use]
pub fn polygons_intersect(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    a.intersects(b)
}

/// Returns `true` if the polygons overlap with positive area.
#[must_use]
pub fn polygons_overlap(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    a.intersects(b) && a.intersection(b).unsigned_area() > AREA_EPSILON
}

/// Bounding rectangle of a polygon ring, `None` if it has no vertices.
#[must_use]
pub fn polygon_bounds(polygon: &Polygon<f64>) -> Option<Bounds2> {
    Bounds2::from_points(&polygon_points(polygon))
}

/// Edges of a counter-clockwise ring whose outer side faces `viewpoint`.
///
/// Returns, for each such edge, its start and end indices into `ring`.
#[must_use]
pub fn front_facing_edges(ring: &[DVec2], viewpoint: DVec2) -> Vec<(usize, usize)> {
    let n = ring.len();
    (0..n)
        .filter_map(|i| {
            let j = (i + 1) % n;
            // Counter-clockwise ring: interior on the left, so an edge faces
            // the viewpoint when it lies strictly to the right.
            (orientation(ring[i], ring[j], viewpoint) < -EPSILON).then_some((i, j))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(origin: DVec2, size: f64) -> Polygon<f64> {
        Bounds2::from_origin_size(origin, DVec2::splat(size)).to_polygon()
    }

    #[test]
    fn polygon_round_trips_points() {
        let pts = [DVec2::ZERO, DVec2::X, DVec2::ONE, DVec2::Y];
        let poly = polygon_from_points(&pts);
        assert_eq!(polygon_points(&poly).len(), 4);
        assert!((poly.unsigned_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn union_of_overlapping_squares() {
        let shapes = union_all([square(DVec2::ZERO, 2.0), square(DVec2::ONE, 2.0)]);
        assert!((shapes.unsigned_area() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn pairwise_overlap_requires_two() {
        let a = MultiPolygon::new(vec![square(DVec2::ZERO, 2.0)]);
        let b = MultiPolygon::new(vec![square(DVec2::ONE, 2.0)]);
        let c = MultiPolygon::new(vec![square(DVec2::splat(10.0), 1.0)]);
        let overlap = pairwise_overlap(&[a, b, c]);
        assert!((overlap.unsigned_area() - 1.0).abs() < 1e-9);
        assert!(pairwise_overlap(&[MultiPolygon::new(vec![square(DVec2::ZERO, 1.0)])])
            .0
            .is_empty());
    }

    #[test]
    fn disjoint_shapes_collapse_to_hull() {
        let shapes = MultiPolygon::new(vec![
            square(DVec2::ZERO, 1.0),
            square(DVec2::new(3.0, 0.0), 1.0),
        ]);
        let hull = single_polygon(&shapes).unwrap();
        assert!((hull.unsigned_area() - 4.0).abs() < 1e-9);
        assert!(single_polygon(&empty()).is_none());
    }

    #[test]
    fn front_edges_of_square_seen_head_on() {
        let ring = Bounds2::from_origin_size(DVec2::ZERO, DVec2::splat(1.0)).corners();
        let edges = front_facing_edges(&ring, DVec2::new(-5.0, 0.5));
        assert_eq!(edges.len(), 1);
        let edges = front_facing_edges(&ring, DVec2::new(-5.0, -5.0));
        assert_eq!(edges.len(), 2);
        assert!(front_facing_edges(&ring, DVec2::splat(0.5)).is_empty());
    }

    #[test]
    fn segment_inside_counts_as_intersecting() {
        let poly = square(DVec2::ZERO, 10.0);
        assert!(intersects_segment(&poly, DVec2::splat(2.0), DVec2::splat(3.0)));
        assert!(intersects_segment(&poly, DVec2::new(-1.0, 5.0), DVec2::new(11.0, 5.0)));
        assert!(!intersects_segment(&poly, DVec2::new(-1.0, -1.0), DVec2::new(-1.0, 20.0)));
    }

    #[test]
    fn dedup_drops_repeats_and_closing_point() {
        let ring = [DVec2::ZERO, DVec2::ZERO, DVec2::X, DVec2::ONE, DVec2::ZERO];
        assert_eq!(dedup_ring(&ring), vec![DVec2::ZERO, DVec2::X, DVec2::ONE]);
        assert!(is_degenerate(&polygon_from_points(&[DVec2::ZERO, DVec2::X, DVec2::X])));
    }
}
