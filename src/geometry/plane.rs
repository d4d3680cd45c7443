use glam::DVec3;

use super::EPSILON;

/// A plane in 3D space, represented as (normal.x, normal.y, normal.z, distance)
/// where the plane equation is: ax + by + cz + d = 0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing into the positive half-space.
    pub normal: DVec3,
    /// Signed distance from origin (`n · p + d = 0`).
    pub distance: f64,
}

impl Plane {
    /// Create a plane from coefficients and normalize it
    #[must_use]
    pub fn from_coefficients(a: f64, b: f64, c: f64, d: f64) -> Self {
        let len = (a * a + b * b + c * c).sqrt();
        if len > 0.0 {
            Self {
                normal: DVec3::new(a / len, b / len, c / len),
                distance: d / len,
            }
        } else {
            Self {
                normal: DVec3::ZERO,
                distance: 0.0,
            }
        }
    }

    /// Plane through a point with the given (not necessarily unit) normal.
    #[must_use]
    pub fn from_point_normal(point: DVec3, normal: DVec3) -> Self {
        let n = normal.normalize_or_zero();
        Self {
            normal: n,
            distance: -n.dot(point),
        }
    }

    /// Plane through three points; the normal follows `(b - a) × (c - a)`.
    #[must_use]
    pub fn from_points(a: DVec3, b: DVec3, c: DVec3) -> Self {
        Self::from_point_normal(a, (b - a).cross(c - a))
    }

    /// Returns `true` if the normal is degenerate (collinear input).
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.normal.length_squared() < EPSILON
    }

    /// Signed distance from point to plane (positive = in front, negative =
    /// behind)
    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, point: DVec3) -> f64 {
        self.normal.dot(point) + self.distance
    }

    /// Parameter `t` at which `origin + t * direction` meets the plane, or
    /// `None` when the ray is parallel to it.
    #[must_use]
    pub fn ray_intersection(&self, origin: DVec3, direction: DVec3) -> Option<f64> {
        let denom = self.normal.dot(direction);
        if denom.abs() < EPSILON {
            return None;
        }
        Some(-self.distance_to_point(origin) / denom)
    }

    /// Intersection point of the segment `a..b` with the plane, if the
    /// endpoints lie on strictly opposite sides.
    #[must_use]
    pub fn segment_intersection(&self, a: DVec3, b: DVec3) -> Option<DVec3> {
        let da = self.distance_to_point(a);
        let db = self.distance_to_point(b);
        if da * db >= 0.0 {
            return None;
        }
        let t = da / (da - db);
        Some(a + (b - a) * t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_points_define_horizontal_plane() {
        let plane = Plane::from_points(
            DVec3::new(0.0, 0.0, 5.0),
            DVec3::new(1.0, 0.0, 5.0),
            DVec3::new(0.0, 1.0, 5.0),
        );
        assert!((plane.normal - DVec3::Z).length() < 1e-12);
        assert!((plane.distance_to_point(DVec3::new(3.0, 3.0, 7.0)) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ray_hits_plane() {
        let plane = Plane::from_point_normal(DVec3::new(0.0, 0.0, 10.0), DVec3::Z);
        let t = plane.ray_intersection(DVec3::ZERO, DVec3::new(0.0, 0.0, 2.0)).unwrap();
        assert!((t - 5.0).abs() < 1e-12);
        assert!(plane.ray_intersection(DVec3::ZERO, DVec3::X).is_none());
    }

    #[test]
    fn segment_crossing_plane() {
        let plane = Plane::from_point_normal(DVec3::ZERO, DVec3::X);
        let hit = plane
            .segment_intersection(DVec3::new(-1.0, 2.0, 0.0), DVec3::new(3.0, 2.0, 0.0))
            .unwrap();
        assert!((hit - DVec3::new(0.0, 2.0, 0.0)).length() < 1e-12);
        assert!(plane
            .segment_intersection(DVec3::new(1.0, 0.0, 0.0), DVec3::new(2.0, 0.0, 0.0))
            .is_none());
    }
}
