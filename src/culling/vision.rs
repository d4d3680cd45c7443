use geo::Polygon;
use glam::{DVec2, DVec3};

use crate::geometry::{
    polygon::{
        self, contains_point, front_facing_edges, intersects_segment, polygon_bounds,
        polygon_from_points, polygon_points, polygons_intersect,
    },
    segment::cross,
    Bounds2,
};

/// The region swept between an eye point and the part of a target's border
/// it can see, with the elevation band a blocker must touch.
#[derive(Debug, Clone)]
pub struct VisionPolygon {
    /// Eye position.
    pub origin: DVec3,
    /// The swept region, counter-clockwise.
    pub polygon: Polygon<f64>,
    /// Bounding rectangle of `polygon`.
    pub bounds: Bounds2,
    /// Lowest elevation of the band.
    pub bottom: f64,
    /// Highest elevation of the band.
    pub top: f64,
}

impl VisionPolygon {
    /// Build the polygon from `origin` to a target whose border is `border`
    /// and whose vertical extent is `[target_bottom, target_top]`.
    ///
    /// The border's viewable points are the endpoints of its edges facing
    /// the eye. With at most one of them (or the eye inside the border) the
    /// polygon is the border itself; with two, a triangle to that edge
    /// joined with the rectangle from the edge to the border's center; with
    /// more, the triangle from the eye to the two angularly outermost
    /// points. Returns `None` for a degenerate border.
    #[must_use]
    pub fn build(
        origin: DVec3,
        border: &[DVec2],
        target_bottom: f64,
        target_top: f64,
    ) -> Option<Self> {
        let border_poly = polygon_from_points(border);
        if polygon::is_degenerate(&border_poly) {
            return None;
        }
        let ring = polygon_points(&border_poly);
        let eye = origin.truncate();

        let mut viewable: Vec<usize> = Vec::new();
        if !contains_point(&border_poly, eye) {
            for (i, j) in front_facing_edges(&ring, eye) {
                for k in [i, j] {
                    if !viewable.contains(&k) {
                        viewable.push(k);
                    }
                }
            }
        }

        let shape = match viewable.len() {
            0 | 1 => border_poly,
            2 => {
                let (a, b) = (ring[viewable[0]], ring[viewable[1]]);
                let center = ring.iter().copied().sum::<DVec2>() / ring.len() as f64;
                let shift = center - (a + b) * 0.5;
                let triangle = polygon_from_points(&[eye, a, b]);
                let rectangle = polygon_from_points(&[a, b, b + shift, a + shift]);
                let merged = polygon::union_all([triangle, rectangle]);
                polygon::single_polygon(&merged)?
            }
            _ => {
                let center = ring.iter().copied().sum::<DVec2>() / ring.len() as f64;
                let axis = center - eye;
                let angle = |p: DVec2| {
                    let d = p - eye;
                    cross(axis, d).atan2(axis.dot(d))
                };
                let mut extremes = viewable.iter().map(|&i| ring[i]);
                let first = extremes.next()?;
                let (mut lo, mut hi) = (first, first);
                for p in extremes {
                    if angle(p) < angle(lo) {
                        lo = p;
                    }
                    if angle(p) > angle(hi) {
                        hi = p;
                    }
                }
                polygon_from_points(&[eye, lo, hi])
            }
        };
        if polygon::is_degenerate(&shape) {
            return None;
        }
        let bounds = polygon_bounds(&shape)?;
        Some(Self {
            origin,
            polygon: shape,
            bounds,
            bottom: origin.z.min(target_bottom),
            top: origin.z.max(target_top),
        })
    }

    /// Returns `true` if `[bottom, top]` meets the elevation band.
    #[must_use]
    pub fn overlaps_elevation(&self, bottom: f64, top: f64) -> bool {
        bottom <= self.top && top >= self.bottom
    }

    /// Returns `true` if elevation `z` lies inside the band.
    #[must_use]
    pub fn contains_elevation(&self, z: f64) -> bool {
        (self.bottom..=self.top).contains(&z)
    }

    /// Segment crosses the polygon or has an endpoint inside it.
    #[must_use]
    pub fn intersects_segment(&self, a: DVec2, b: DVec2) -> bool {
        self.bounds.intersects(&Bounds2::new(a, b)) && intersects_segment(&self.polygon, a, b)
    }

    /// The ring `points` shares area or boundary with the polygon.
    #[must_use]
    pub fn intersects_ring(&self, points: &[DVec2]) -> bool {
        let Some(bounds) = Bounds2::from_points(points) else {
            return false;
        };
        self.bounds.intersects(&bounds)
            && polygons_intersect(&self.polygon, &polygon_from_points(points))
    }

    /// Ring points of the polygon.
    #[must_use]
    pub fn points(&self) -> Vec<DVec2> {
        polygon_points(&self.polygon)
    }
}
