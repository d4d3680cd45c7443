use glam::DVec3;

use super::triangle::{RayHit, Triangle3};

/// A planar quadrilateral `a, b, c, d` in winding order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad3 {
    /// First corner.
    pub a: DVec3,
    /// Second corner.
    pub b: DVec3,
    /// Third corner.
    pub c: DVec3,
    /// Fourth corner.
    pub d: DVec3,
}

impl Quad3 {
    /// Construct from four corners in winding order.
    #[must_use]
    pub const fn new(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> Self {
        Self { a, b, c, d }
    }

    /// Vertical quad standing on the 2D segment `(x0, y0)..(x1, y1)` between
    /// `bottom` and `top` elevations.
    #[must_use]
    pub fn vertical(x0: f64, y0: f64, x1: f64, y1: f64, bottom: f64, top: f64) -> Self {
        Self::new(
            DVec3::new(x0, y0, bottom),
            DVec3::new(x1, y1, bottom),
            DVec3::new(x1, y1, top),
            DVec3::new(x0, y0, top),
        )
    }

    /// The two triangles `(a, b, c)` and `(a, c, d)`.
    #[must_use]
    pub fn triangles(&self) -> [Triangle3; 2] {
        [
            Triangle3::new(self.a, self.b, self.c),
            Triangle3::new(self.a, self.c, self.d),
        ]
    }

    /// Ray/quad intersection via the two triangles.
    #[must_use]
    pub fn ray_intersection(&self, origin: DVec3, direction: DVec3) -> Option<RayHit> {
        let [first, second] = self.triangles();
        first
            .ray_intersection(origin, direction)
            .or_else(|| second.ray_intersection(origin, direction))
    }

    /// Segment/quad intersection excluding the endpoints (see
    /// [`Triangle3::segment_intersection`]).
    #[must_use]
    pub fn segment_intersection(&self, start: DVec3, end: DVec3, margin: f64) -> Option<RayHit> {
        let hit = self.ray_intersection(start, end - start)?;
        (hit.t > margin && hit.t < 1.0 - margin).then_some(hit)
    }
}
