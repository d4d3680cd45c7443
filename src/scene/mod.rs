//! Host scene: the placeables a visibility test reads.
//!
//! Every category lives in a [`Layer`], a map from id to placeable paired
//! with a [`QuadTree`] over their bounds. All mutation goes through
//! [`Scene`] methods, which bump the scene's generation so dependent caches
//! (blocking objects, meshes, target shapes) know to rebuild.

mod grid;
mod light;
mod quadtree;
mod region;
mod tile;
mod token;
mod wall;

use std::{fmt, hash::Hash};

pub use grid::{Grid, GridKind, MAX_CELLS};
pub use light::Light;
pub use quadtree::QuadTree;
pub use region::Region;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
pub use tile::{AlphaMask, Tile};
pub use token::{Token, TokenStatus};
pub use wall::{
    DoorState, SenseRestriction, SenseRestrictions, SenseType, Wall, WallBlock, WallDirection,
    WALL_HEIGHT_LIMIT,
};

use crate::geometry::Bounds2;

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Identifier of a [`Wall`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct WallId(pub u32);

/// Identifier of a [`Tile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TileId(pub u32);

/// Identifier of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TokenId(pub u32);

/// Identifier of a [`Light`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct LightId(pub u32);

/// Identifier of a [`Region`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct RegionId(pub u32);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// A scene object stored in a [`Layer`].
pub trait Placeable: Clone {
    /// Identifier type.
    type Id: Copy + Eq + Ord + Hash + fmt::Debug;

    /// This object's identifier.
    fn id(&self) -> Self::Id;

    /// 2D bounding rectangle used by the spatial index.
    fn bounds(&self) -> Bounds2;

    /// The scene layer holding this category.
    fn layer(scene: &Scene) -> &Layer<Self>;

    /// Mutable access to the layer. Only [`Scene`] mutates layers.
    #[doc(hidden)]
    fn layer_mut(scene: &mut Scene) -> &mut Layer<Self>;
}

/// Placeables of one category with a spatial index.
#[derive(Debug, Clone)]
pub struct Layer<T: Placeable> {
    items: FxHashMap<T::Id, T>,
    index: QuadTree<T::Id>,
}

impl<T: Placeable> Layer<T> {
    fn new(bounds: Bounds2) -> Self {
        Self {
            items: FxHashMap::default(),
            index: QuadTree::new(bounds),
        }
    }

    fn upsert(&mut self, item: T) -> Option<T> {
        let previous = self.remove(item.id());
        self.index.insert(item.bounds(), item.id());
        let _ = self.items.insert(item.id(), item);
        previous
    }

    fn remove(&mut self, id: T::Id) -> Option<T> {
        let item = self.items.remove(&id)?;
        let _ = self.index.remove(&item.bounds(), id);
        Some(item)
    }

    /// Look up by id.
    #[must_use]
    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.items.get(&id)
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the layer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All items, ordered by id.
    #[must_use]
    pub fn all(&self) -> Vec<&T> {
        let mut items: Vec<&T> = self.items.values().collect();
        items.sort_by_key(|item| item.id());
        items
    }

    /// Items whose bounds intersect `region`, ordered by id.
    #[must_use]
    pub fn query(&self, region: &Bounds2) -> Vec<&T> {
        let mut ids = self.index.query(region);
        ids.sort_unstable();
        ids.iter().filter_map(|id| self.items.get(id)).collect()
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// The scene a visibility test runs against.
#[derive(Debug, Clone)]
pub struct Scene {
    dimensions: Bounds2,
    grid: Grid,
    background_elevation: f64,
    global_light: bool,
    walls: Layer<Wall>,
    tiles: Layer<Tile>,
    tokens: Layer<Token>,
    lights: Layer<Light>,
    regions: Layer<Region>,
    /// Monotonically increasing generation; bumped on any mutation.
    generation: u64,
}

impl Scene {
    /// Create an empty scene covering `dimensions`.
    #[must_use]
    pub fn new(dimensions: Bounds2) -> Self {
        Self {
            dimensions,
            grid: Grid::default(),
            background_elevation: 0.0,
            global_light: true,
            walls: Layer::new(dimensions),
            tiles: Layer::new(dimensions),
            tokens: Layer::new(dimensions),
            lights: Layer::new(dimensions),
            regions: Layer::new(dimensions),
            generation: 0,
        }
    }

    // -- Mutation helpers --

    fn invalidate(&mut self) {
        self.generation += 1;
    }

    /// Current generation. Changes whenever the scene is mutated.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // -- Scene settings --

    /// Scene rectangle.
    #[must_use]
    pub fn dimensions(&self) -> Bounds2 {
        self.dimensions
    }

    /// Grid configuration.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Replace the grid configuration.
    pub fn set_grid(&mut self, grid: Grid) {
        self.grid = grid;
        self.invalidate();
    }

    /// Elevation of the ground plane that separates stacked levels.
    #[must_use]
    pub fn background_elevation(&self) -> f64 {
        self.background_elevation
    }

    /// Set the background elevation.
    pub fn set_background_elevation(&mut self, elevation: f64) {
        self.background_elevation = elevation;
        self.invalidate();
    }

    /// When `true` the whole scene is lit and light shapes never restrict a
    /// target.
    #[must_use]
    pub fn global_light(&self) -> bool {
        self.global_light
    }

    /// Toggle global illumination.
    pub fn set_global_light(&mut self, enabled: bool) {
        self.global_light = enabled;
        self.invalidate();
    }

    // -- Placeables --

    /// Insert or replace a placeable. Returns the replaced value, if any.
    pub fn upsert<T: Placeable>(&mut self, item: T) -> Option<T> {
        let previous = T::layer_mut(self).upsert(item);
        self.invalidate();
        previous
    }

    /// Remove a placeable by id.
    pub fn remove<T: Placeable>(&mut self, id: T::Id) -> Option<T> {
        let removed = T::layer_mut(self).remove(id)?;
        self.invalidate();
        Some(removed)
    }

    /// Layer holding placeables of type `T`.
    #[must_use]
    pub fn layer<T: Placeable>(&self) -> &Layer<T> {
        T::layer(self)
    }

    /// Walls.
    #[must_use]
    pub fn walls(&self) -> &Layer<Wall> {
        &self.walls
    }

    /// Tiles.
    #[must_use]
    pub fn tiles(&self) -> &Layer<Tile> {
        &self.tiles
    }

    /// Tokens.
    #[must_use]
    pub fn tokens(&self) -> &Layer<Token> {
        &self.tokens
    }

    /// Lights.
    #[must_use]
    pub fn lights(&self) -> &Layer<Light> {
        &self.lights
    }

    /// Regions.
    #[must_use]
    pub fn regions(&self) -> &Layer<Region> {
        &self.regions
    }

    /// Look up a token.
    #[must_use]
    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(id)
    }

    // -- Documents --

    /// Build a scene from its serialized form.
    #[must_use]
    pub fn from_document(doc: SceneDocument) -> Self {
        let mut scene = Self::new(doc.dimensions);
        scene.grid = doc.grid;
        scene.background_elevation = doc.background_elevation;
        scene.global_light = doc.global_light;
        for wall in doc.walls {
            let _ = scene.walls.upsert(wall);
        }
        for tile in doc.tiles {
            let _ = scene.tiles.upsert(tile);
        }
        for token in doc.tokens {
            let _ = scene.tokens.upsert(token);
        }
        for light in doc.lights {
            let _ = scene.lights.upsert(light);
        }
        for region in doc.regions {
            let _ = scene.regions.upsert(region);
        }
        scene
    }

    /// Serializable snapshot of the scene, placeables ordered by id.
    #[must_use]
    pub fn to_document(&self) -> SceneDocument {
        SceneDocument {
            dimensions: self.dimensions,
            grid: self.grid,
            background_elevation: self.background_elevation,
            global_light: self.global_light,
            walls: self.walls.all().into_iter().cloned().collect(),
            tiles: self.tiles.all().into_iter().cloned().collect(),
            tokens: self.tokens.all().into_iter().cloned().collect(),
            lights: self.lights.all().into_iter().cloned().collect(),
            regions: self.regions.all().into_iter().cloned().collect(),
        }
    }
}

/// Serialized scene, as exchanged with a host or stored in a fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDocument {
    /// Scene rectangle.
    pub dimensions: Bounds2,
    /// Grid configuration.
    pub grid: Grid,
    /// Ground plane elevation.
    pub background_elevation: f64,
    /// Global illumination.
    pub global_light: bool,
    /// Walls.
    pub walls: Vec<Wall>,
    /// Tiles.
    pub tiles: Vec<Tile>,
    /// Tokens.
    pub tokens: Vec<Token>,
    /// Lights.
    pub lights: Vec<Light>,
    /// Regions.
    pub regions: Vec<Region>,
}

impl Default for SceneDocument {
    fn default() -> Self {
        Self {
            dimensions: Bounds2::new(glam::DVec2::ZERO, glam::DVec2::splat(4000.0)),
            grid: Grid::default(),
            background_elevation: 0.0,
            global_light: true,
            walls: Vec::new(),
            tiles: Vec::new(),
            tokens: Vec::new(),
            lights: Vec::new(),
            regions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;

    fn scene() -> Scene {
        Scene::new(Bounds2::new(DVec2::ZERO, DVec2::splat(1000.0)))
    }

    #[test]
    fn mutations_bump_generation() {
        let mut s = scene();
        let g0 = s.generation();
        let _ = s.upsert(Token::new(TokenId(1), 0.0, 0.0));
        assert!(s.generation() > g0);
        let g1 = s.generation();
        assert!(s.remove::<Token>(TokenId(9)).is_none());
        assert_eq!(s.generation(), g1, "missing ids do not invalidate");
        assert!(s.remove::<Token>(TokenId(1)).is_some());
        assert!(s.generation() > g1);
    }

    #[test]
    fn upsert_moves_item_in_index() {
        let mut s = scene();
        let _ = s.upsert(Token::new(TokenId(1), 0.0, 0.0));
        let previous = s.upsert(Token::new(TokenId(1), 800.0, 800.0));
        assert_eq!(previous.map(|t| t.x), Some(0.0));
        let near_origin = Bounds2::new(DVec2::ZERO, DVec2::splat(50.0));
        assert!(s.tokens().query(&near_origin).is_empty());
        let near_corner = Bounds2::new(DVec2::splat(850.0), DVec2::splat(860.0));
        assert_eq!(s.tokens().query(&near_corner).len(), 1);
        assert_eq!(s.tokens().len(), 1);
    }

    #[test]
    fn query_is_ordered_by_id() {
        let mut s = scene();
        for id in [5, 2, 9] {
            let _ = s.upsert(Wall::new(WallId(id), DVec2::new(10.0, 0.0), DVec2::new(10.0, 50.0)));
        }
        let ids: Vec<u32> = s
            .walls()
            .query(&Bounds2::new(DVec2::ZERO, DVec2::splat(20.0)))
            .iter()
            .map(|w| w.id.0)
            .collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn document_round_trip() {
        let mut s = scene();
        let _ = s.upsert(Wall::new(WallId(1), DVec2::ZERO, DVec2::X * 100.0));
        let _ = s.upsert(Light::new(LightId(3), 10.0, 10.0, 50.0));
        s.set_global_light(false);
        let json = serde_json::to_string(&s.to_document()).unwrap();
        let doc: SceneDocument = serde_json::from_str(&json).unwrap();
        let restored = Scene::from_document(doc);
        assert_eq!(restored.walls().len(), 1);
        assert!(restored.lights().get(LightId(3)).is_some());
        assert!(!restored.global_light());
    }

    #[test]
    fn token_id_display() {
        assert_eq!(TokenId(4).to_string(), "token#4");
    }
}
