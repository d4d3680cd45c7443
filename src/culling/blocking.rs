use super::vision::VisionPolygon;
use crate::{
    options::LosOptions,
    scene::{Placeable, Region, Scene, Tile, Token, Wall, WallBlock},
};

/// Placeables that could occlude one eye's view of one target.
#[derive(Debug, Clone, Default)]
pub struct BlockingObjects {
    /// Walls that block outright.
    pub walls: Vec<Wall>,
    /// Limited walls; a sightline is blocked where it crosses two or more.
    pub terrain_walls: Vec<Wall>,
    /// Overhead tiles.
    pub tiles: Vec<Tile>,
    /// Other tokens.
    pub tokens: Vec<Token>,
    /// Sight-blocking regions.
    pub regions: Vec<Region>,
}

impl BlockingObjects {
    /// Returns `true` if anything here could block. A single terrain wall
    /// cannot block on its own, so it does not count.
    #[must_use]
    pub fn has_potential_obstacles(&self) -> bool {
        !self.walls.is_empty()
            || self.terrain_walls.len() >= 2
            || !self.tiles.is_empty()
            || !self.tokens.is_empty()
            || !self.regions.is_empty()
    }

    /// Total number of candidate blockers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.walls.len()
            + self.terrain_walls.len()
            + self.tiles.len()
            + self.tokens.len()
            + self.regions.len()
    }

    /// Returns `true` if there are no candidates at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns `true` if `token` is allowed to block under the token options.
#[must_use]
pub fn token_blocks(token: &Token, options: &LosOptions) -> bool {
    let rules = &options.block.tokens;
    if token.status.dead {
        rules.dead
    } else if token.status.prone {
        rules.prone
    } else {
        rules.live
    }
}

/// Cull the scene down to placeables that can block `viewer`'s view of
/// `target` through `vision`.
///
/// `None` for `vision` (a degenerate target border) yields no blockers.
#[must_use]
pub fn find_blocking_objects(
    scene: &Scene,
    vision: Option<&VisionPolygon>,
    viewer: &Token,
    target: &Token,
    options: &LosOptions,
) -> BlockingObjects {
    let mut found = BlockingObjects::default();
    let Some(vision) = vision else {
        return found;
    };

    if options.block.walls {
        for wall in scene.walls().query(&vision.bounds) {
            if !wall.overlaps_elevation(vision.bottom, vision.top)
                || !vision.intersects_segment(wall.a, wall.b)
            {
                continue;
            }
            match wall.block_for(vision.origin, options.sense_type) {
                WallBlock::Full => found.walls.push(wall.clone()),
                WallBlock::Terrain => found.terrain_walls.push(wall.clone()),
                WallBlock::None => {}
            }
        }
    }

    if options.block.tiles {
        let threshold = options.tile.alpha_threshold;
        found.tiles = scene
            .tiles()
            .query(&vision.bounds)
            .into_iter()
            .filter(|tile| tile.overhead && vision.contains_elevation(tile.elevation))
            .filter(|tile| {
                tile.opaque_corners(threshold)
                    .is_some_and(|corners| vision.intersects_ring(&corners))
            })
            .cloned()
            .collect();
    }

    found.tokens = scene
        .tokens()
        .query(&vision.bounds)
        .into_iter()
        .filter(|t| t.id != viewer.id && t.id != target.id)
        .filter(|t| !t.is_linked_to(viewer) && !t.is_linked_to(target))
        .filter(|t| token_blocks(t, options))
        .filter(|t| vision.overlaps_elevation(t.bottom_z(), t.top_z()))
        .filter(|t| vision.intersects_ring(&t.rectangle()))
        .cloned()
        .collect();

    if options.block.regions {
        found.regions = scene
            .regions()
            .query(&vision.bounds)
            .into_iter()
            .filter(|r| r.blocks_sight && vision.overlaps_elevation(r.bottom, r.top))
            .filter(|r| r.bounds().area() > 0.0 && vision.intersects_ring(&r.shape))
            .cloned()
            .collect();
    }

    log::debug!(
        "culled {} walls, {} terrain walls, {} tiles, {} tokens, {} regions",
        found.walls.len(),
        found.terrain_walls.len(),
        found.tiles.len(),
        found.tokens.len(),
        found.regions.len()
    );
    found
}
