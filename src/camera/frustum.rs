//! View frustum for culling
//!
//! Extracts frustum planes from the view-projection matrix and provides
//! intersection tests for points and boxes.

use glam::{DMat4, DVec3, DVec4};

use crate::geometry::Plane;

/// View frustum consisting of 6 planes
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Six clipping planes: left, right, bottom, top, near, far.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix.
    /// Uses the Gribb/Hartmann method for plane extraction.
    /// Planes point inward (positive half-space is inside the frustum).
    #[must_use]
    pub fn from_view_projection(vp: DMat4) -> Self {
        let rows: [DVec4; 4] = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];
        let [row0, row1, row2, row3] = rows;

        // [0,1] depth: the near plane is row2 alone.
        let planes = [
            row3 + row0,
            row3 - row0,
            row3 + row1,
            row3 - row1,
            row2,
            row3 - row2,
        ]
        .map(|p| Plane::from_coefficients(p.x, p.y, p.z, p.w));
        Self { planes }
    }

    /// Test if a point is inside the frustum
    #[inline]
    #[must_use]
    pub fn contains_point(&self, point: DVec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(point) >= -1e-9)
    }

    /// Conservative box test: `false` only when the box lies entirely outside
    /// one plane.
    #[must_use]
    pub fn intersects_box(&self, min: DVec3, max: DVec3) -> bool {
        self.planes.iter().all(|plane| {
            // Corner furthest along the plane normal.
            let p = DVec3::new(
                if plane.normal.x >= 0.0 { max.x } else { min.x },
                if plane.normal.y >= 0.0 { max.y } else { min.y },
                if plane.normal.z >= 0.0 { max.z } else { min.z },
            );
            plane.distance_to_point(p) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frustum() -> Frustum {
        let proj = DMat4::perspective_rh(45.0_f64.to_radians(), 1.0, 0.1, 100.0);
        let view = DMat4::look_at_rh(DVec3::new(0.0, 0.0, 10.0), DVec3::ZERO, DVec3::Y);
        Frustum::from_view_projection(proj * view)
    }

    #[test]
    fn contains_origin_not_behind() {
        let f = frustum();
        assert!(f.contains_point(DVec3::ZERO));
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, 20.0)));
    }

    #[test]
    fn box_tests() {
        let f = frustum();
        assert!(f.intersects_box(DVec3::splat(-1.0), DVec3::splat(1.0)));
        assert!(!f.intersects_box(DVec3::new(-1.0, -1.0, 30.0), DVec3::new(1.0, 1.0, 40.0)));
        // Straddles the left plane.
        assert!(f.intersects_box(DVec3::new(-50.0, -1.0, -1.0), DVec3::new(0.0, 1.0, 1.0)));
    }
}
