use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

use glam::DVec2;
use rustc_hash::FxHashMap;

use super::{
    geometry::{
        box_geometry, region_geometry, tile_geometry, token_geometry, wall_geometry, PlaceableMesh,
    },
    template::TemplateRegistry,
};
use crate::{
    geometry::Bounds2,
    scene::{Region, RegionId, Scene, Tile, TileId, Token, TokenId, Wall, WallId},
    util::hash::{fingerprint_hasher, hash_dvec2, hash_dvec2_slice, hash_f64},
};

/// Which border a token mesh was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenShape {
    /// The full rectangle.
    Rectangle,
    /// Clipped by walls crossing the token.
    Constrained,
    /// Restricted to the lit part of the border.
    Lit,
}

/// Cache key: one mesh per placeable (and token variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceableKey {
    /// A wall quad.
    Wall(WallId),
    /// An overhead tile quad.
    Tile(TileId),
    /// A token box or prism.
    Token(TokenId, TokenShape),
    /// A region prism.
    Region(RegionId),
}

#[derive(Debug)]
struct CachedMesh {
    fingerprint: u64,
    mesh: Arc<PlaceableMesh>,
}

/// World-space meshes keyed by placeable, rebuilt only when the source
/// document's fingerprint changes.
#[derive(Debug, Default)]
pub struct MeshCache {
    registry: TemplateRegistry,
    entries: FxHashMap<PlaceableKey, CachedMesh>,
    rebuilds: u64,
}

impl MeshCache {
    /// Empty cache with freshly built templates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Template registry used for rectangle shapes.
    #[must_use]
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Number of cached meshes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many meshes have been (re)built since creation.
    #[must_use]
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Drop every cached mesh.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop meshes of placeables no longer in `scene`.
    pub fn retain_present(&mut self, scene: &Scene) {
        let before = self.entries.len();
        self.entries.retain(|key, _| match *key {
            PlaceableKey::Wall(id) => scene.walls().get(id).is_some(),
            PlaceableKey::Tile(id) => scene.tiles().get(id).is_some(),
            PlaceableKey::Token(id, _) => scene.tokens().get(id).is_some(),
            PlaceableKey::Region(id) => scene.regions().get(id).is_some(),
        });
        let evicted = before - self.entries.len();
        if evicted > 0 {
            log::debug!("evicted {evicted} meshes of removed placeables");
        }
    }

    fn get_or_build(
        &mut self,
        key: PlaceableKey,
        fingerprint: u64,
        build: impl FnOnce(&TemplateRegistry) -> PlaceableMesh,
    ) -> Arc<PlaceableMesh> {
        if let Some(entry) = self.entries.get(&key) {
            if entry.fingerprint == fingerprint {
                return Arc::clone(&entry.mesh);
            }
        }
        let mesh = Arc::new(build(&self.registry));
        self.rebuilds += 1;
        let _ = self.entries.insert(
            key,
            CachedMesh {
                fingerprint,
                mesh: Arc::clone(&mesh),
            },
        );
        mesh
    }

    /// Mesh of a wall.
    pub fn wall(&mut self, wall: &Wall) -> Arc<PlaceableMesh> {
        let mut h = fingerprint_hasher();
        hash_dvec2(wall.a, &mut h);
        hash_dvec2(wall.b, &mut h);
        hash_f64(wall.bottom_z(), &mut h);
        hash_f64(wall.top_z(), &mut h);
        self.get_or_build(PlaceableKey::Wall(wall.id), h.finish(), |r| {
            wall_geometry(wall, r).to_mesh()
        })
    }

    /// Mesh of a tile's opaque part at `alpha_threshold`; empty when the tile
    /// is fully transparent.
    pub fn tile(&mut self, tile: &Tile, alpha_threshold: f64) -> Arc<PlaceableMesh> {
        let mut h = fingerprint_hasher();
        for v in [tile.x, tile.y, tile.width, tile.height, tile.rotation, tile.elevation] {
            hash_f64(v, &mut h);
        }
        hash_f64(alpha_threshold, &mut h);
        tile.alpha.hash(&mut h);
        self.get_or_build(PlaceableKey::Tile(tile.id), h.finish(), |r| {
            tile_geometry(tile, alpha_threshold, r)
                .map(|g| g.to_mesh())
                .unwrap_or_default()
        })
    }

    /// Mesh of a token, over `border` when given (constrained or lit) and
    /// the rectangle otherwise.
    pub fn token(
        &mut self,
        token: &Token,
        shape: TokenShape,
        border: Option<&[DVec2]>,
    ) -> Arc<PlaceableMesh> {
        let mut h = fingerprint_hasher();
        for v in [
            token.x,
            token.y,
            token.width,
            token.height,
            token.elevation,
            token.vertical_height,
        ] {
            hash_f64(v, &mut h);
        }
        if let Some(ring) = border {
            hash_dvec2_slice(ring, &mut h);
        }
        self.get_or_build(PlaceableKey::Token(token.id, shape), h.finish(), |r| {
            token_geometry(token, border, r).to_mesh()
        })
    }

    /// Mesh of a region prism; empty for a degenerate footprint.
    pub fn region(&mut self, region: &Region) -> Arc<PlaceableMesh> {
        let mut h = fingerprint_hasher();
        hash_dvec2_slice(&region.shape, &mut h);
        hash_f64(region.bottom, &mut h);
        hash_f64(region.top, &mut h);
        self.get_or_build(PlaceableKey::Region(region.id), h.finish(), |_| {
            region_geometry(region)
                .map(|g| g.to_mesh())
                .unwrap_or_default()
        })
    }

    /// Uncached box mesh, used for grid cells.
    #[must_use]
    pub fn cell(&self, bounds: &Bounds2, bottom: f64, top: f64) -> PlaceableMesh {
        box_geometry(bounds, bottom, top, &self.registry).to_mesh()
    }
}
