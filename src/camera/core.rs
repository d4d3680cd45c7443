use glam::{DMat4, DVec3, DVec4};

use super::frustum::Frustum;
use crate::geometry::Bounds2;

/// Hard ceiling on the fitted field of view.
pub const MAX_FOV_DEGREES: f64 = 143.0;
/// Floor on the fitted field of view.
pub const MIN_FOV_DEGREES: f64 = 1.0;

/// Projection model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// Pinhole perspective.
    #[default]
    Perspective,
    /// Parallel projection.
    Orthographic,
}

/// Camera looking from an eye point at a target.
///
/// Matrices are rebuilt lazily: setters mark them dirty and the accessors
/// recompute on the next read.
#[derive(Debug, Clone)]
pub struct Camera {
    position: DVec3,
    target: DVec3,
    /// Vertical field of view in degrees.
    fov: f64,
    /// Viewport aspect ratio (width / height).
    aspect: f64,
    near: f64,
    far: f64,
    /// Half extent of the orthographic view volume.
    ortho_half_extent: f64,
    projection: Projection,
    view: DMat4,
    proj: DMat4,
    view_dirty: bool,
    proj_dirty: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            target: DVec3::X,
            fov: 90.0,
            aspect: 1.0,
            near: 1.0,
            far: 1000.0,
            ortho_half_extent: 1.0,
            projection: Projection::Perspective,
            view: DMat4::IDENTITY,
            proj: DMat4::IDENTITY,
            view_dirty: true,
            proj_dirty: true,
        }
    }
}

impl Camera {
    /// Camera at `position` looking at `target`.
    #[must_use]
    pub fn new(position: DVec3, target: DVec3) -> Self {
        Self {
            position,
            target,
            ..Self::default()
        }
    }

    /// Eye position.
    #[must_use]
    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// Look-at point.
    #[must_use]
    pub fn target(&self) -> DVec3 {
        self.target
    }

    /// Vertical field of view in degrees.
    #[must_use]
    pub fn fov(&self) -> f64 {
        self.fov
    }

    /// Near plane distance.
    #[must_use]
    pub fn near(&self) -> f64 {
        self.near
    }

    /// Far plane distance.
    #[must_use]
    pub fn far(&self) -> f64 {
        self.far
    }

    /// Move the eye.
    pub fn set_position(&mut self, position: DVec3) {
        if position != self.position {
            self.position = position;
            self.view_dirty = true;
        }
    }

    /// Move the look-at point.
    pub fn set_target(&mut self, target: DVec3) {
        if target != self.target {
            self.target = target;
            self.view_dirty = true;
        }
    }

    /// Set the vertical field of view in degrees.
    pub fn set_fov(&mut self, fov: f64) {
        self.fov = fov;
        self.proj_dirty = true;
    }

    /// Set near and far plane distances.
    pub fn set_clip_planes(&mut self, near: f64, far: f64) {
        self.near = near;
        self.far = far.max(near + f64::EPSILON);
        self.proj_dirty = true;
    }

    /// Switch between perspective and orthographic projection.
    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.proj_dirty = true;
    }

    /// Up vector for the current view direction: world up (+z) unless the
    /// camera looks nearly straight up or down.
    #[must_use]
    pub fn up(&self) -> DVec3 {
        let dir = (self.target - self.position).normalize_or_zero();
        if dir.dot(DVec3::Z).abs() > 0.999 {
            DVec3::Y
        } else {
            DVec3::Z
        }
    }

    /// World-to-camera transform.
    pub fn view_matrix(&mut self) -> DMat4 {
        if self.view_dirty {
            self.view = DMat4::look_at_rh(self.position, self.target, self.up());
            self.view_dirty = false;
        }
        self.view
    }

    /// Camera-to-clip transform with a `[0, 1]` depth range.
    pub fn projection_matrix(&mut self) -> DMat4 {
        if self.proj_dirty {
            self.proj = match self.projection {
                Projection::Perspective => {
                    DMat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
                }
                Projection::Orthographic => {
                    let h = self.ortho_half_extent;
                    let w = h * self.aspect;
                    DMat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
                }
            };
            self.proj_dirty = false;
        }
        self.proj
    }

    /// Combined projection × view.
    pub fn view_projection(&mut self) -> DMat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Frustum of the current view.
    pub fn frustum(&mut self) -> Frustum {
        Frustum::from_view_projection(self.view_projection())
    }

    /// World point to normalized device coordinates.
    pub fn project(&mut self, world: DVec3) -> DVec3 {
        self.view_projection().project_point3(world)
    }

    /// Normalized device coordinates back to a world point.
    pub fn unproject(&mut self, ndc: DVec3) -> DVec3 {
        let inv = self.view_projection().inverse();
        let p: DVec4 = inv * ndc.extend(1.0);
        p.truncate() / p.w
    }

    /// Fit the projection to a target box `bounds × [bottom, top]`.
    ///
    /// The field of view is twice the largest angle between the view axis and
    /// any box corner, clamped to `max_fov` (the viewer's vision angle) and to
    /// [`MAX_FOV_DEGREES`]. The far plane sits past the box's far corner.
    pub fn set_target_token_frustum(
        &mut self,
        bounds: &Bounds2,
        bottom: f64,
        top: f64,
        max_fov: f64,
    ) {
        let axis = (self.target - self.position).normalize_or_zero();
        let mut max_angle: f64 = 0.0;
        for corner in bounds.corners() {
            for z in [bottom, top] {
                let to_corner = (corner.extend(z) - self.position).normalize_or_zero();
                let angle = axis.dot(to_corner).clamp(-1.0, 1.0).acos();
                max_angle = max_angle.max(angle);
            }
        }
        let fov = (max_angle.to_degrees() * 2.0)
            .min(max_fov)
            .min(MAX_FOV_DEGREES)
            .max(MIN_FOV_DEGREES);

        let half_size = bounds.width().max(bounds.height()).max(top - bottom) * 0.5;
        let far = self.position.distance(self.target) + 3.0_f64.sqrt() * half_size;

        self.fov = fov;
        self.ortho_half_extent = 3.0_f64.sqrt() * half_size.max(f64::EPSILON);
        self.far = far.max(self.near + 1.0);
        self.proj_dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;

    fn aimed() -> Camera {
        Camera::new(DVec3::new(0.0, 50.0, 50.0), DVec3::new(550.0, 50.0, 50.0))
    }

    #[test]
    fn target_projects_to_center() {
        let mut cam = aimed();
        let ndc = cam.project(DVec3::new(550.0, 50.0, 50.0));
        assert!(ndc.x.abs() < 1e-9 && ndc.y.abs() < 1e-9);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn project_unproject_round_trip() {
        let mut cam = aimed();
        let bounds = Bounds2::from_origin_size(DVec2::new(500.0, 0.0), DVec2::splat(100.0));
        cam.set_target_token_frustum(&bounds, 0.0, 100.0, 360.0);
        for p in [
            DVec3::new(500.0, 0.0, 0.0),
            DVec3::new(600.0, 100.0, 100.0),
            DVec3::new(523.5, 71.0, 12.0),
        ] {
            let projected = cam.project(p);
            let back = cam.unproject(projected);
            assert!((back - p).length() < 1e-6, "{p} -> {back}");
        }
    }

    #[test]
    fn fitted_frustum_contains_box() {
        let mut cam = aimed();
        let bounds = Bounds2::from_origin_size(DVec2::new(500.0, 0.0), DVec2::splat(100.0));
        cam.set_target_token_frustum(&bounds, 0.0, 100.0, 360.0);
        let frustum = cam.frustum();
        for c in bounds.corners() {
            assert!(frustum.contains_point(c.extend(0.0)));
            assert!(frustum.contains_point(c.extend(100.0)));
        }
        assert!(cam.fov() > MIN_FOV_DEGREES && cam.fov() < 30.0);
    }

    #[test]
    fn fov_is_clamped() {
        // Eye right next to a big box.
        let mut cam = Camera::new(DVec3::new(-1.0, 50.0, 50.0), DVec3::new(50.0, 50.0, 50.0));
        let bounds = Bounds2::from_origin_size(DVec2::ZERO, DVec2::splat(100.0));
        cam.set_target_token_frustum(&bounds, 0.0, 100.0, 360.0);
        assert_eq!(cam.fov(), MAX_FOV_DEGREES);
        cam.set_target_token_frustum(&bounds, 0.0, 100.0, 60.0);
        assert_eq!(cam.fov(), 60.0);
    }

    #[test]
    fn vertical_view_switches_up_vector() {
        let cam = Camera::new(DVec3::new(0.0, 0.0, 100.0), DVec3::ZERO);
        assert_eq!(cam.up(), DVec3::Y);
        assert_eq!(aimed().up(), DVec3::Z);
    }

    #[test]
    fn orthographic_round_trip() {
        let mut cam = aimed();
        cam.set_projection(Projection::Orthographic);
        let bounds = Bounds2::from_origin_size(DVec2::new(500.0, 0.0), DVec2::splat(100.0));
        cam.set_target_token_frustum(&bounds, 0.0, 100.0, 360.0);
        let p = DVec3::new(510.0, 20.0, 80.0);
        let projected = cam.project(p);
        let back = cam.unproject(projected);
        assert!((back - p).length() < 1e-6);
    }
}
