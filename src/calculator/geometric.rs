use geo::{Area, BooleanOps, MultiPolygon, Polygon};
use glam::{DMat4, DVec2, DVec3};

use super::{occluders::Occluders, CalcContext, PercentVisibleResult, VisibilityData};
use crate::{
    geometry::{
        polygon::{self, polygon_from_points, AREA_EPSILON},
        Plane, Triangle3, EPSILON,
    },
    mesh::{MeshCache, PlaceableMesh},
};

/// Projected shapes from the last calculation, in normalized device
/// coordinates.
#[derive(Debug, Clone)]
pub struct ProjectedView {
    /// Visible part of the target.
    pub target: MultiPolygon<f64>,
    /// Everything that blocks it.
    pub blocked: MultiPolygon<f64>,
}

/// Percent visible as projected area: the target's silhouette minus the
/// union of blocker silhouettes, over the target's full silhouette.
#[derive(Debug, Default)]
pub struct GeometricCalculator {
    last: Option<ProjectedView>,
}

impl GeometricCalculator {
    /// Calculator with no cached projection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shapes from the last calculation.
    #[must_use]
    pub fn last_projection(&self) -> Option<&ProjectedView> {
        self.last.as_ref()
    }

    /// Project target and blockers and measure the unblocked area.
    pub fn calculate(
        &mut self,
        ctx: &CalcContext<'_>,
        cache: &mut MeshCache,
    ) -> PercentVisibleResult {
        self.last = None;
        let shape = ctx.target;
        let id = shape.token.id;
        let Some(visible_mesh) = shape.visible_mesh(cache) else {
            return PercentVisibleResult::blocked(id);
        };

        let mut camera = ctx.target_camera();
        let projector = Projector {
            view: camera.view_matrix(),
            proj: camera.projection_matrix(),
            near: camera.near(),
        };
        let frustum = camera.frustum();

        let full_area = projector.project(&shape.full_mesh(cache), None).unsigned_area();
        if full_area <= AREA_EPSILON {
            return PercentVisibleResult::visible(id);
        }
        let total = if ctx.uses_large_target() {
            let cell = ctx.scene.grid().center_cell(&shape.bounds);
            let cell_mesh = cache.cell(&cell, shape.bottom, shape.top);
            let cell_area = projector.project(&cell_mesh, None).unsigned_area();
            if cell_area > AREA_EPSILON {
                full_area.min(cell_area)
            } else {
                full_area
            }
        } else {
            full_area
        };

        let target = projector.project(&visible_mesh, None);
        let occluders = Occluders::collect(ctx.blocking, cache, ctx.options.tile.alpha_threshold);
        let in_view = |mesh: &PlaceableMesh| frustum.intersects_box(mesh.min, mesh.max);
        let opaque: Vec<&PlaceableMesh> = occluders
            .opaque
            .iter()
            .map(|o| o.mesh.as_ref())
            .filter(|m| in_view(*m))
            .collect();
        let terrain: Vec<&PlaceableMesh> = occluders
            .terrain
            .iter()
            .map(|mesh| mesh.as_ref())
            .filter(|m| in_view(*m))
            .collect();

        // A blocker hides part of a front face only where it lies between
        // the eye and that face's plane.
        let mut blocked = polygon::empty();
        for face in front_faces(&visible_mesh, ctx.eye) {
            let face_shape = polygon::union_all(
                face.triangles
                    .iter()
                    .filter_map(|tri| projector.project_triangle(tri, None)),
            );
            if face_shape.unsigned_area() <= AREA_EPSILON {
                continue;
            }
            let mut cover = polygon::empty();
            for mesh in &opaque {
                cover = cover.union(&projector.project(mesh, Some(&face.plane)));
            }
            let crossings: Vec<MultiPolygon<f64>> = terrain
                .iter()
                .map(|mesh| projector.project(mesh, Some(&face.plane)))
                .filter(|shapes| shapes.unsigned_area() > AREA_EPSILON)
                .collect();
            if crossings.len() >= 2 {
                cover = cover.union(&polygon::pairwise_overlap(&crossings));
            }
            blocked = blocked.union(&face_shape.intersection(&cover));
        }

        let visible = target.difference(&blocked).unsigned_area();
        log::debug!("geometric: visible {visible:.6} of {total:.6} (full {full_area:.6})");
        self.last = Some(ProjectedView { target, blocked });
        PercentVisibleResult {
            target: id,
            data: VisibilityData::Area { visible, total },
        }
    }
}

/// View and projection of one eye, with near-plane clipping.
struct Projector {
    view: DMat4,
    proj: DMat4,
    near: f64,
}

impl Projector {
    /// Union of the mesh's projected triangles. Geometry nearer than the
    /// near plane is cut away, as is geometry on the negative side of
    /// `keep_front_of` when given.
    fn project(&self, mesh: &PlaceableMesh, keep_front_of: Option<&Plane>) -> MultiPolygon<f64> {
        polygon::union_all(
            mesh.triangles
                .iter()
                .filter_map(|tri| self.project_triangle(tri, keep_front_of)),
        )
    }

    fn project_triangle(
        &self,
        tri: &Triangle3,
        keep_front_of: Option<&Plane>,
    ) -> Option<Polygon<f64>> {
        let mut ring = vec![tri.a, tri.b, tri.c];
        if let Some(plane) = keep_front_of {
            ring = clip_ring(&ring, |p| plane.distance_to_point(p));
        }
        let view: Vec<DVec3> = ring.iter().map(|p| self.view.transform_point3(*p)).collect();
        // View space looks down -z.
        let view = clip_ring(&view, |p| -p.z - self.near);
        if view.len() < 3 {
            return None;
        }
        let ndc: Vec<DVec2> = view
            .iter()
            .map(|p| self.proj.project_point3(*p).truncate())
            .collect();
        Some(polygon_from_points(&ndc))
    }
}

/// Coplanar target triangles facing the eye, with their plane oriented so
/// the eye is on the positive side.
struct FrontFace<'a> {
    plane: Plane,
    triangles: Vec<&'a Triangle3>,
}

/// Group the triangles of `mesh` that face `eye` by supporting plane.
/// Facing is judged against the mesh's bounding-box center, which is exact
/// for boxes and convex prisms.
fn front_faces(mesh: &PlaceableMesh, eye: DVec3) -> Vec<FrontFace<'_>> {
    let center = (mesh.min + mesh.max) * 0.5;
    let mut faces: Vec<FrontFace<'_>> = Vec::new();
    for tri in &mesh.triangles {
        let mut plane = tri.plane();
        if plane.is_degenerate() {
            continue;
        }
        let eye_side = plane.distance_to_point(eye);
        if eye_side.abs() <= EPSILON {
            continue;
        }
        if eye_side < 0.0 {
            plane = Plane {
                normal: -plane.normal,
                distance: -plane.distance,
            };
        }
        if plane.distance_to_point(center) > EPSILON {
            continue;
        }
        let same = |f: &FrontFace<'_>| {
            f.plane.normal.dot(plane.normal) > 1.0 - 1e-9
                && (f.plane.distance - plane.distance).abs() < 1e-6
        };
        match faces.iter_mut().find(|f| same(f)) {
            Some(face) => face.triangles.push(tri),
            None => faces.push(FrontFace {
                plane,
                triangles: vec![tri],
            }),
        }
    }
    faces
}

/// Sutherland–Hodgman against one plane; keeps points where `distance` is
/// non-negative.
fn clip_ring(ring: &[DVec3], distance: impl Fn(DVec3) -> f64) -> Vec<DVec3> {
    let mut out = Vec::with_capacity(ring.len() + 1);
    for (i, &current) in ring.iter().enumerate() {
        let next = ring[(i + 1) % ring.len()];
        let (dc, dn) = (distance(current), distance(next));
        if dc >= 0.0 {
            out.push(current);
        }
        if (dc >= 0.0) != (dn >= 0.0) {
            let t = dc / (dc - dn);
            out.push(current + (next - current) * t);
        }
    }
    out
}
