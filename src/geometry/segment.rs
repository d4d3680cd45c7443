use glam::DVec2;

use super::EPSILON;

/// 2D cross product `a.x * b.y - a.y * b.x`.
#[inline]
#[must_use]
pub fn cross(a: DVec2, b: DVec2) -> f64 {
    a.perp_dot(b)
}

/// Which side of the directed line `a -> b` the point `p` lies on:
/// positive = left, negative = right, zero = collinear.
#[inline]
#[must_use]
pub fn orientation(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    cross(b - a, p - a)
}

/// Find parameter t where ray `origin + t * direction` hits segment `a..b`.
/// Returns Some(t) if hit (t >= 0), None if miss or parallel.
#[must_use]
pub fn ray_segment_intersection(
    origin: DVec2,
    direction: DVec2,
    a: DVec2,
    b: DVec2,
) -> Option<f64> {
    let s = b - a;
    let denom = cross(direction, s);
    if denom.abs() < 1e-12 {
        return None;
    }
    let d = a - origin;
    let t = cross(d, s) / denom;
    let u = cross(d, direction) / denom;
    (t >= 0.0 && (0.0..=1.0).contains(&u)).then_some(t)
}

/// Intersection point of segments `a0..a1` and `b0..b1`, if any.
/// Collinear overlaps report no single point.
#[must_use]
pub fn segment_intersection(a0: DVec2, a1: DVec2, b0: DVec2, b1: DVec2) -> Option<DVec2> {
    let r = a1 - a0;
    let s = b1 - b0;
    let denom = cross(r, s);
    if denom.abs() < EPSILON {
        return None;
    }
    let d = b0 - a0;
    let t = cross(d, s) / denom;
    let u = cross(d, r) / denom;
    ((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)).then(|| a0 + r * t)
}

/// Returns `true` if the segments properly cross or touch.
#[must_use]
pub fn segments_intersect(a0: DVec2, a1: DVec2, b0: DVec2, b1: DVec2) -> bool {
    segment_intersection(a0, a1, b0, b1).is_some()
}

/// Squared distance from `p` to the closest point of segment `a..b`.
#[must_use]
pub fn point_to_segment_distance_squared(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < EPSILON {
        return p.distance_squared(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance_squared(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_sign() {
        let a = DVec2::ZERO;
        let b = DVec2::X;
        assert!(orientation(a, b, DVec2::Y) > 0.0);
        assert!(orientation(a, b, DVec2::NEG_Y) < 0.0);
        assert_eq!(orientation(a, b, DVec2::new(2.0, 0.0)), 0.0);
    }

    #[test]
    fn ray_segment_hit_and_miss() {
        let t = ray_segment_intersection(
            DVec2::ZERO,
            DVec2::X,
            DVec2::new(3.0, -1.0),
            DVec2::new(3.0, 1.0),
        )
        .unwrap();
        assert!((t - 3.0).abs() < 1e-12);
        assert!(ray_segment_intersection(
            DVec2::ZERO,
            DVec2::NEG_X,
            DVec2::new(3.0, -1.0),
            DVec2::new(3.0, 1.0)
        )
        .is_none());
    }

    #[test]
    fn crossing_segments() {
        let p = segment_intersection(
            DVec2::new(-1.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(0.0, -1.0),
            DVec2::new(0.0, 1.0),
        )
        .unwrap();
        assert!(p.length() < 1e-12);
        assert!(!segments_intersect(
            DVec2::ZERO,
            DVec2::X,
            DVec2::new(0.0, 1.0),
            DVec2::new(1.0, 1.0)
        ));
    }

    #[test]
    fn distance_to_segment_clamps_to_endpoints() {
        let d = point_to_segment_distance_squared(DVec2::new(-3.0, 4.0), DVec2::ZERO, DVec2::X);
        assert!((d - 25.0).abs() < 1e-12);
        let d = point_to_segment_distance_squared(DVec2::new(0.5, 2.0), DVec2::ZERO, DVec2::X);
        assert!((d - 4.0).abs() < 1e-12);
    }
}
