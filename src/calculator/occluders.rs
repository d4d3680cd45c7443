use std::sync::Arc;

use glam::DVec3;

use crate::{
    culling::BlockingObjects,
    mesh::{MeshCache, PlaceableMesh},
    scene::Tile,
};

/// Hits closer than this (in segment parameter space) to either end of a
/// sightline are ignored.
pub const SEGMENT_MARGIN: f64 = 1e-6;

/// A mesh that blocks outright, optionally textured by a tile's alpha mask.
#[derive(Debug, Clone)]
pub struct Occluder<'a> {
    /// World-space triangles.
    pub mesh: Arc<PlaceableMesh>,
    /// Source tile when the mesh is an overhead tile.
    pub tile: Option<&'a Tile>,
}

/// World-space meshes of every culled blocker, split by how they block.
#[derive(Debug, Clone, Default)]
pub struct Occluders<'a> {
    /// Walls, tiles, tokens and regions that block on their own.
    pub opaque: Vec<Occluder<'a>>,
    /// Limited walls, one mesh each.
    pub terrain: Vec<Arc<PlaceableMesh>>,
    alpha_threshold: f64,
}

impl<'a> Occluders<'a> {
    /// Fetch (or build) the meshes for `blocking`.
    pub fn collect(
        blocking: &'a BlockingObjects,
        cache: &mut MeshCache,
        alpha_threshold: f64,
    ) -> Self {
        let mut opaque = Vec::with_capacity(blocking.len());
        for wall in &blocking.walls {
            opaque.push(Occluder {
                mesh: cache.wall(wall),
                tile: None,
            });
        }
        for tile in &blocking.tiles {
            opaque.push(Occluder {
                mesh: cache.tile(tile, alpha_threshold),
                tile: Some(tile),
            });
        }
        for token in &blocking.tokens {
            opaque.push(Occluder {
                mesh: cache.token(token, crate::mesh::TokenShape::Rectangle, None),
                tile: None,
            });
        }
        for region in &blocking.regions {
            opaque.push(Occluder {
                mesh: cache.region(region),
                tile: None,
            });
        }
        opaque.retain(|o| !o.mesh.is_empty());
        let terrain = blocking.terrain_walls.iter().map(|w| cache.wall(w)).collect();
        Self {
            opaque,
            terrain,
            alpha_threshold,
        }
    }

    /// Alpha threshold tile texels are tested against.
    #[must_use]
    pub fn alpha_threshold(&self) -> f64 {
        self.alpha_threshold
    }

    /// Returns `true` if there is nothing to test against.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.terrain.is_empty()
    }

    /// Returns `true` if the segment `start → end` hits an opaque blocker or
    /// crosses two or more distinct terrain walls.
    #[must_use]
    pub fn segment_blocked(&self, start: DVec3, end: DVec3) -> bool {
        if self.opaque.iter().any(|o| self.occluder_hit(o, start, end)) {
            return true;
        }
        let mut crossed = 0;
        for mesh in &self.terrain {
            if mesh_hit(mesh, start, end) {
                crossed += 1;
                if crossed >= 2 {
                    return true;
                }
            }
        }
        false
    }

    fn occluder_hit(&self, occluder: &Occluder<'_>, start: DVec3, end: DVec3) -> bool {
        let mesh = &occluder.mesh;
        if !segment_meets_box(start, end, mesh.min, mesh.max) {
            return false;
        }
        for (i, tri) in mesh.triangles.iter().enumerate() {
            let Some(hit) = tri.segment_intersection(start, end, SEGMENT_MARGIN) else {
                continue;
            };
            match (occluder.tile, mesh.uvs.get(i)) {
                (Some(tile), Some([a, b, c])) => {
                    let uv = hit.barycentric.interpolate2(*a, *b, *c);
                    if tile.is_opaque_at(uv, self.alpha_threshold) {
                        return true;
                    }
                }
                _ => return true,
            }
        }
        false
    }
}

fn mesh_hit(mesh: &PlaceableMesh, start: DVec3, end: DVec3) -> bool {
    segment_meets_box(start, end, mesh.min, mesh.max)
        && mesh
            .triangles
            .iter()
            .any(|t| t.segment_intersection(start, end, SEGMENT_MARGIN).is_some())
}

/// Slab test of a segment against an axis-aligned box.
fn segment_meets_box(start: DVec3, end: DVec3, min: DVec3, max: DVec3) -> bool {
    let dir = end - start;
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for axis in 0..3 {
        let (s, d, lo, hi) = (start[axis], dir[axis], min[axis], max[axis]);
        if d.abs() < f64::EPSILON {
            if s < lo || s > hi {
                return false;
            }
            continue;
        }
        let (mut a, mut b) = ((lo - s) / d, (hi - s) / d);
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }
        t0 = t0.max(a);
        t1 = t1.min(b);
        if t0 > t1 {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;
    use crate::scene::{AlphaMask, SenseRestriction, TileId, Wall, WallId};

    fn wall(id: u32, x: f64) -> Wall {
        Wall::new(WallId(id), DVec2::new(x, 0.0), DVec2::new(x, 100.0))
    }

    const START: DVec3 = DVec3::new(0.0, 50.0, 50.0);
    const END: DVec3 = DVec3::new(500.0, 50.0, 50.0);

    #[test]
    fn opaque_wall_blocks() {
        let blocking = BlockingObjects {
            walls: vec![wall(1, 250.0)],
            ..BlockingObjects::default()
        };
        let mut cache = MeshCache::new();
        let occ = Occluders::collect(&blocking, &mut cache, 0.75);
        assert!(occ.segment_blocked(START, END));
        assert!(!occ.segment_blocked(START, DVec3::new(0.0, 500.0, 50.0)));
    }

    #[test]
    fn terrain_needs_two_walls() {
        let limited = |id, x| wall(id, x).with_restriction(SenseRestriction::Limited);
        let mut cache = MeshCache::new();
        let one = BlockingObjects {
            terrain_walls: vec![limited(1, 200.0)],
            ..BlockingObjects::default()
        };
        assert!(!Occluders::collect(&one, &mut cache, 0.75).segment_blocked(START, END));
        let two = BlockingObjects {
            terrain_walls: vec![limited(1, 200.0), limited(2, 300.0)],
            ..BlockingObjects::default()
        };
        assert!(Occluders::collect(&two, &mut cache, 0.75).segment_blocked(START, END));
    }

    #[test]
    fn endpoint_on_surface_does_not_block() {
        let blocking = BlockingObjects {
            walls: vec![wall(1, 500.0)],
            ..BlockingObjects::default()
        };
        let mut cache = MeshCache::new();
        let occ = Occluders::collect(&blocking, &mut cache, 0.75);
        assert!(!occ.segment_blocked(START, END));
    }

    #[test]
    fn transparent_texels_let_rays_through() {
        // Left half of the mask is opaque, right half transparent.
        let mask = AlphaMask::new(2, 1, vec![255, 0]).unwrap();
        let tile = Tile {
            id: TileId(1),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            elevation: 50.0,
            alpha: Some(mask),
            ..Tile::default()
        };
        let blocking = BlockingObjects {
            tiles: vec![tile],
            ..BlockingObjects::default()
        };
        let mut cache = MeshCache::new();
        let occ = Occluders::collect(&blocking, &mut cache, 0.5);
        let above = |x: f64| DVec3::new(x, 50.0, 100.0);
        let below = |x: f64| DVec3::new(x, 50.0, 0.0);
        assert!(occ.segment_blocked(above(25.0), below(25.0)));
        assert!(!occ.segment_blocked(above(75.0), below(75.0)));
    }
}
