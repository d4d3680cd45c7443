//! Per-placeable vertex, index and transform generation.

use geo::{Area, TriangulateEarcut};
use glam::{DMat4, DQuat, DVec2, DVec3};

use super::template::{TemplateKey, TemplateRegistry};
use crate::{
    geometry::{
        polygon::{dedup_ring, polygon_from_points, AREA_EPSILON},
        Bounds2, Triangle3,
    },
    scene::{Region, Tile, Token, Wall, WALL_HEIGHT_LIMIT},
};

/// Model data plus the transform that places it in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceableGeometry {
    /// Model-space positions.
    pub vertices: Vec<DVec3>,
    /// Per-vertex texture coordinates; empty when untextured.
    pub uvs: Vec<DVec2>,
    /// Triangle list into `vertices`.
    pub indices: Vec<u16>,
    /// Model-to-world transform.
    pub transform: DMat4,
}

/// World-space triangles of one placeable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaceableMesh {
    /// Triangles in world space.
    pub triangles: Vec<Triangle3>,
    /// Texture coordinates per triangle corner; empty when untextured.
    pub uvs: Vec<[DVec2; 3]>,
    /// Minimum corner of the world-space bounding box.
    pub min: DVec3,
    /// Maximum corner of the world-space bounding box.
    pub max: DVec3,
}

impl PlaceableMesh {
    /// Returns `true` if there are no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Returns `true` if the mesh carries texture coordinates.
    #[must_use]
    pub fn is_textured(&self) -> bool {
        !self.uvs.is_empty()
    }
}

impl PlaceableGeometry {
    fn from_template(registry: &TemplateRegistry, key: TemplateKey, transform: DMat4) -> Self {
        let t = registry.get(key);
        Self {
            vertices: t.vertices.clone(),
            uvs: t.uvs.clone(),
            indices: t.indices.clone(),
            transform,
        }
    }

    /// Apply the transform and assemble world-space triangles.
    #[must_use]
    pub fn to_mesh(&self) -> PlaceableMesh {
        let world: Vec<DVec3> = self
            .vertices
            .iter()
            .map(|v| self.transform.transform_point3(*v))
            .collect();
        let textured = self.uvs.len() == self.vertices.len() && !self.uvs.is_empty();
        let mut mesh = PlaceableMesh {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
            ..PlaceableMesh::default()
        };
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (Some(pa), Some(pb), Some(pc)) = (world.get(a), world.get(b), world.get(c)) else {
                continue;
            };
            mesh.triangles.push(Triangle3::new(*pa, *pb, *pc));
            if textured {
                mesh.uvs.push([self.uvs[a], self.uvs[b], self.uvs[c]]);
            }
            for p in [pa, pb, pc] {
                mesh.min = mesh.min.min(*p);
                mesh.max = mesh.max.max(*p);
            }
        }
        if mesh.triangles.is_empty() {
            mesh.min = DVec3::ZERO;
            mesh.max = DVec3::ZERO;
        }
        mesh
    }
}

/// Vertical quad spanning the wall's segment and elevation range.
#[must_use]
pub fn wall_geometry(wall: &Wall, registry: &TemplateRegistry) -> PlaceableGeometry {
    let delta = wall.b - wall.a;
    let mid = (wall.a + wall.b) * 0.5;
    let bottom = wall.bottom_z();
    let transform = DMat4::from_scale_rotation_translation(
        DVec3::new(delta.length(), 1.0, wall.top_z() - bottom),
        DQuat::from_rotation_z(delta.y.atan2(delta.x)),
        mid.extend(bottom),
    );
    PlaceableGeometry::from_template(registry, TemplateKey::VerticalQuad, transform)
}

/// Horizontal quad covering the part of the tile that is opaque at
/// `alpha_threshold`, with texture coordinates into the tile's mask.
/// `None` for a fully transparent tile.
#[must_use]
pub fn tile_geometry(
    tile: &Tile,
    alpha_threshold: f64,
    registry: &TemplateRegistry,
) -> Option<PlaceableGeometry> {
    let uv = tile.opaque_uv_bounds(alpha_threshold)?;
    let size = DVec2::new(uv.width(), uv.height());
    let transform = tile.uv_to_world()
        * DMat4::from_translation(uv.min.extend(0.0))
        * DMat4::from_scale(size.extend(1.0))
        * DMat4::from_translation(DVec3::new(0.5, 0.5, 0.0));
    let mut geometry =
        PlaceableGeometry::from_template(registry, TemplateKey::HorizontalQuad, transform);
    for t in &mut geometry.uvs {
        *t = uv.min + *t * size;
    }
    Some(geometry)
}

/// Box over the token's rectangle, or a prism over `border` when the token
/// is constrained.
#[must_use]
pub fn token_geometry(
    token: &Token,
    border: Option<&[DVec2]>,
    registry: &TemplateRegistry,
) -> PlaceableGeometry {
    let rectangle =
        || box_geometry(&token_bounds(token), token.bottom_z(), token.top_z(), registry);
    match border {
        Some(ring) => {
            prism_geometry(ring, token.bottom_z(), token.top_z()).unwrap_or_else(rectangle)
        }
        None => rectangle(),
    }
}

/// Prism over the region's footprint. `None` for a degenerate shape.
#[must_use]
pub fn region_geometry(region: &Region) -> Option<PlaceableGeometry> {
    let clamp = |z: f64, fallback: f64| {
        if z.is_finite() {
            z.clamp(-WALL_HEIGHT_LIMIT, WALL_HEIGHT_LIMIT)
        } else {
            fallback
        }
    };
    prism_geometry(
        &region.shape,
        clamp(region.bottom, -WALL_HEIGHT_LIMIT),
        clamp(region.top, WALL_HEIGHT_LIMIT),
    )
}

/// Axis-aligned box `bounds × [bottom, top]` from the cube template.
#[must_use]
pub fn box_geometry(
    bounds: &Bounds2,
    bottom: f64,
    top: f64,
    registry: &TemplateRegistry,
) -> PlaceableGeometry {
    let transform = DMat4::from_scale_rotation_translation(
        DVec3::new(bounds.width(), bounds.height(), top - bottom),
        DQuat::IDENTITY,
        bounds.center().extend(bottom),
    );
    PlaceableGeometry::from_template(registry, TemplateKey::Cube, transform)
}

fn token_bounds(token: &Token) -> Bounds2 {
    Bounds2::from_origin_size(DVec2::new(token.x, token.y), DVec2::new(token.width, token.height))
}

/// Extrude a ring between two elevations. Vertices are emitted in world
/// space with an identity transform.
fn prism_geometry(ring: &[DVec2], bottom: f64, top: f64) -> Option<PlaceableGeometry> {
    let ring = dedup_ring(ring);
    if ring.len() < 3 {
        return None;
    }
    let polygon = polygon_from_points(&ring);
    if polygon.unsigned_area() < AREA_EPSILON {
        return None;
    }
    let caps = polygon.earcut_triangles();
    if caps.is_empty() {
        return None;
    }
    let n = ring.len();
    let vertex_count = caps.len() * 6 + n * 4;
    if vertex_count > usize::from(u16::MAX) {
        log::warn!("prism with {n} vertices exceeds u16 indices; using its bounds");
        return None;
    }

    let mut vertices = Vec::with_capacity(vertex_count);
    let mut indices = Vec::with_capacity(caps.len() * 6 + n * 6);
    let mut push = |v: DVec3, vertices: &mut Vec<DVec3>| {
        vertices.push(v);
        indices.push((vertices.len() - 1) as u16);
    };
    for tri in &caps {
        let [a, b, c] = tri.to_array().map(|p| DVec2::new(p.x, p.y));
        for (z, order) in [(bottom, [a, c, b]), (top, [a, b, c])] {
            for p in order {
                push(p.extend(z), &mut vertices);
            }
        }
    }
    for i in 0..n {
        let (p, q) = (ring[i], ring[(i + 1) % n]);
        for v in [
            p.extend(bottom),
            q.extend(bottom),
            q.extend(top),
            p.extend(bottom),
            q.extend(top),
            p.extend(top),
        ] {
            push(v, &mut vertices);
        }
    }
    Some(PlaceableGeometry {
        vertices,
        uvs: Vec::new(),
        indices,
        transform: DMat4::IDENTITY,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{AlphaMask, RegionId, TileId, TokenId, WallId};

    fn registry() -> TemplateRegistry {
        TemplateRegistry::new()
    }

    #[test]
    fn wall_quad_spans_segment_and_height() {
        let wall = Wall::new(WallId(1), DVec2::new(100.0, 0.0), DVec2::new(100.0, 200.0))
            .with_elevation(Some(10.0), Some(40.0));
        let mesh = wall_geometry(&wall, &registry()).to_mesh();
        assert_eq!(mesh.triangles.len(), 2);
        assert!((mesh.min - DVec3::new(100.0, 0.0, 10.0)).length() < 1e-9);
        assert!((mesh.max - DVec3::new(100.0, 200.0, 40.0)).length() < 1e-9);
    }

    #[test]
    fn tile_quad_follows_alpha_bounds() {
        let tile = Tile {
            id: TileId(1),
            width: 200.0,
            height: 100.0,
            elevation: 50.0,
            alpha: AlphaMask::new(2, 1, vec![255, 0]),
            ..Tile::default()
        };
        let mesh = tile_geometry(&tile, 0.5, &registry()).unwrap().to_mesh();
        assert!(mesh.is_textured());
        assert!((mesh.max.x - 100.0).abs() < 1e-9);
        assert_eq!(mesh.min.z, 50.0);
        // UVs stay inside the opaque half.
        assert!(mesh.uvs.iter().flatten().all(|uv| uv.x <= 0.5 + 1e-12));
    }

    #[test]
    fn token_box_and_prism() {
        let token = Token::new(TokenId(1), 0.0, 0.0);
        let boxed = token_geometry(&token, None, &registry()).to_mesh();
        assert_eq!(boxed.triangles.len(), 12);
        assert_eq!(boxed.max, DVec3::new(100.0, 100.0, 100.0));

        let ring = [
            DVec2::ZERO,
            DVec2::new(60.0, 0.0),
            DVec2::new(60.0, 100.0),
            DVec2::new(0.0, 100.0),
        ];
        let prism = token_geometry(&token, Some(&ring), &registry()).to_mesh();
        assert_eq!(prism.max.x, 60.0);
        // Two cap triangles each end plus two per side.
        assert_eq!(prism.triangles.len(), 4 + 8);
    }

    #[test]
    fn degenerate_region_has_no_geometry() {
        let region = Region::new(RegionId(1), vec![DVec2::ZERO, DVec2::X], 0.0, 10.0);
        assert!(region_geometry(&region).is_none());
        let repeated = vec![DVec2::ZERO, DVec2::ZERO, DVec2::X, DVec2::X, DVec2::ZERO];
        assert!(region_geometry(&Region::new(RegionId(2), repeated, 0.0, 10.0)).is_none());
        let collinear = vec![DVec2::ZERO, DVec2::X, DVec2::X * 2.0];
        assert!(region_geometry(&Region::new(RegionId(3), collinear, 0.0, 10.0)).is_none());
    }
}
