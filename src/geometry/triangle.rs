use glam::{DMat4, DVec2, DVec3};

use super::{plane::Plane, EPSILON};

/// Barycentric weights `(u, v, w)` of a point relative to a triangle's
/// vertices `(a, b, c)`. They sum to one for points in the triangle's plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Barycentric {
    /// Weight of vertex `a`.
    pub u: f64,
    /// Weight of vertex `b`.
    pub v: f64,
    /// Weight of vertex `c`.
    pub w: f64,
}

impl Barycentric {
    /// Returns `true` when every weight is within `[-tolerance, 1 + tolerance]`.
    #[must_use]
    pub fn is_inside(&self, tolerance: f64) -> bool {
        let range = -tolerance..=1.0 + tolerance;
        range.contains(&self.u) && range.contains(&self.v) && range.contains(&self.w)
    }

    /// Interpolate a per-vertex 2D attribute (e.g. texture coordinates).
    #[must_use]
    pub fn interpolate2(&self, a: DVec2, b: DVec2, c: DVec2) -> DVec2 {
        a * self.u + b * self.v + c * self.w
    }

    /// Interpolate a per-vertex 3D attribute.
    #[must_use]
    pub fn interpolate3(&self, a: DVec3, b: DVec3, c: DVec3) -> DVec3 {
        a * self.u + b * self.v + c * self.w
    }
}

/// Result of a ray or segment hitting a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Ray parameter: hit point is `origin + t * direction`.
    pub t: f64,
    /// Barycentric coordinates of the hit point.
    pub barycentric: Barycentric,
}

/// A triangle in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle3 {
    /// First vertex.
    pub a: DVec3,
    /// Second vertex.
    pub b: DVec3,
    /// Third vertex.
    pub c: DVec3,
}

impl Triangle3 {
    /// Construct from three vertices.
    #[must_use]
    pub const fn new(a: DVec3, b: DVec3, c: DVec3) -> Self {
        Self { a, b, c }
    }

    /// Unnormalized face normal `(b - a) × (c - a)`.
    #[must_use]
    pub fn normal(&self) -> DVec3 {
        (self.b - self.a).cross(self.c - self.a)
    }

    /// Surface area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.normal().length() * 0.5
    }

    /// The supporting plane.
    #[must_use]
    pub fn plane(&self) -> Plane {
        Plane::from_points(self.a, self.b, self.c)
    }

    /// Centroid.
    #[must_use]
    pub fn centroid(&self) -> DVec3 {
        (self.a + self.b + self.c) / 3.0
    }

    /// Apply an affine transform to every vertex.
    #[must_use]
    pub fn transformed(&self, m: &DMat4) -> Self {
        Self {
            a: m.transform_point3(self.a),
            b: m.transform_point3(self.b),
            c: m.transform_point3(self.c),
        }
    }

    /// Barycentric coordinates of `p` projected onto the triangle's plane.
    /// `None` for a degenerate triangle.
    #[must_use]
    pub fn barycentric(&self, p: DVec3) -> Option<Barycentric> {
        let v0 = self.b - self.a;
        let v1 = self.c - self.a;
        let v2 = p - self.a;
        let d00 = v0.dot(v0);
        let d01 = v0.dot(v1);
        let d11 = v1.dot(v1);
        let d20 = v2.dot(v0);
        let d21 = v2.dot(v1);
        let denom = d00 * d11 - d01 * d01;
        if denom.abs() < EPSILON {
            return None;
        }
        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        Some(Barycentric {
            u: 1.0 - v - w,
            v,
            w,
        })
    }

    /// Möller–Trumbore ray/triangle intersection. Both faces count; only hits
    /// with `t >= 0` are reported.
    #[must_use]
    pub fn ray_intersection(&self, origin: DVec3, direction: DVec3) -> Option<RayHit> {
        let edge1 = self.b - self.a;
        let edge2 = self.c - self.a;
        let h = direction.cross(edge2);
        let det = edge1.dot(h);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = origin - self.a;
        let v = inv_det * s.dot(h);
        if !(0.0..=1.0).contains(&v) {
            return None;
        }
        let q = s.cross(edge1);
        let w = inv_det * direction.dot(q);
        if w < 0.0 || v + w > 1.0 {
            return None;
        }
        let t = inv_det * edge2.dot(q);
        if t < 0.0 {
            return None;
        }
        Some(RayHit {
            t,
            barycentric: Barycentric {
                u: 1.0 - v - w,
                v,
                w,
            },
        })
    }

    /// Segment/triangle intersection, excluding hits within `margin` (in
    /// parameter space) of either endpoint so that a segment ending on a
    /// surface does not count as crossing it.
    #[must_use]
    pub fn segment_intersection(&self, start: DVec3, end: DVec3, margin: f64) -> Option<RayHit> {
        let hit = self.ray_intersection(start, end - start)?;
        (hit.t > margin && hit.t < 1.0 - margin).then_some(hit)
    }
}
