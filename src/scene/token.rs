use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use super::{wall::SenseType, Placeable, TokenId, Wall};
use crate::geometry::{
    polygon::{self, intersects_segment},
    sweep::{sweep_polygon, Segment2},
    Bounds2,
};

/// Number of arc segments used to approximate a vision cone.
const CONE_SEGMENTS: usize = 32;

/// Status effects that change whether a token blocks vision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenStatus {
    /// Token is dead or defeated.
    pub dead: bool,
    /// Token is lying prone.
    pub prone: bool,
}

/// A creature or object on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    /// Scene-unique identifier.
    pub id: TokenId,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width in scene units.
    pub width: f64,
    /// Height (y extent) in scene units.
    pub height: f64,
    /// Elevation of the token's base.
    pub elevation: f64,
    /// Vertical extent above `elevation`.
    pub vertical_height: f64,
    /// Facing in degrees, measured from +x toward +y.
    pub rotation: f64,
    /// Width of the vision cone in degrees; 360 sees all around.
    pub vision_angle: f64,
    /// Status effects.
    pub status: TokenStatus,
    /// The token this one is riding, if any.
    pub rider_of: Option<TokenId>,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            id: TokenId(0),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            elevation: 0.0,
            vertical_height: 100.0,
            rotation: 0.0,
            vision_angle: 360.0,
            status: TokenStatus::default(),
            rider_of: None,
        }
    }
}

impl Token {
    /// A default-sized token with its top-left corner at `(x, y)`.
    #[must_use]
    pub fn new(id: TokenId, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            ..Self::default()
        }
    }

    /// 2D center.
    #[must_use]
    pub fn center(&self) -> DVec2 {
        DVec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// 3D center, halfway up the token.
    #[must_use]
    pub fn center3(&self) -> DVec3 {
        self.center()
            .extend(self.elevation + self.vertical_height * 0.5)
    }

    /// Bottom elevation.
    #[must_use]
    pub fn bottom_z(&self) -> f64 {
        self.elevation
    }

    /// Top elevation.
    #[must_use]
    pub fn top_z(&self) -> f64 {
        self.elevation + self.vertical_height.max(0.0)
    }

    /// The unconstrained rectangular border, counter-clockwise.
    #[must_use]
    pub fn rectangle(&self) -> [DVec2; 4] {
        self.bounds().corners()
    }

    /// Returns `true` if either token rides the other.
    #[must_use]
    pub fn is_linked_to(&self, other: &Self) -> bool {
        self.rider_of == Some(other.id) || other.rider_of == Some(self.id)
    }

    /// Border clipped by sight-blocking walls that cross the token.
    ///
    /// Sweeps from the token center against every candidate wall crossing
    /// the rectangle. `None` when no wall crosses, or the clipped shape is
    /// degenerate; callers then use [`Token::rectangle`].
    #[must_use]
    pub fn constrained_border<'a, I>(&self, walls: I) -> Option<Vec<DVec2>>
    where
        I: IntoIterator<Item = &'a Wall>,
    {
        let rect = self.rectangle();
        let rect_poly = polygon::polygon_from_points(&rect);
        let origin = self.center3();
        let segments: Vec<Segment2> = walls
            .into_iter()
            .filter(|w| w.overlaps_elevation(self.bottom_z(), self.top_z()))
            .filter(|w| w.block_for(origin, SenseType::Sight) == super::wall::WallBlock::Full)
            .filter(|w| intersects_segment(&rect_poly, w.a, w.b))
            .map(|w| (w.a, w.b))
            .collect();
        if segments.is_empty() {
            return None;
        }
        let ring = sweep_polygon(self.center(), &segments, &rect);
        let shape = polygon::polygon_from_points(&ring);
        (!polygon::is_degenerate(&shape)).then_some(ring)
    }

    /// The vision cone as a polygon reaching `radius` from the center, or
    /// `None` for all-around vision.
    #[must_use]
    pub fn vision_cone(&self, radius: f64) -> Option<Vec<DVec2>> {
        if self.vision_angle >= 360.0 {
            return None;
        }
        let half = self.vision_angle.max(0.0).to_radians() * 0.5;
        let facing = self.rotation.to_radians();
        let center = self.center();
        let mut ring = Vec::with_capacity(CONE_SEGMENTS + 2);
        ring.push(center);
        for i in 0..=CONE_SEGMENTS {
            let angle = facing - half + 2.0 * half * i as f64 / CONE_SEGMENTS as f64;
            ring.push(center + DVec2::new(angle.cos(), angle.sin()) * radius);
        }
        Some(ring)
    }
}

impl Placeable for Token {
    type Id = TokenId;

    fn id(&self) -> TokenId {
        self.id
    }

    fn bounds(&self) -> Bounds2 {
        Bounds2::from_origin_size(DVec2::new(self.x, self.y), DVec2::new(self.width, self.height))
    }

    fn layer(scene: &super::Scene) -> &super::Layer<Self> {
        &scene.tokens
    }

    fn layer_mut(scene: &mut super::Scene) -> &mut super::Layer<Self> {
        &mut scene.tokens
    }
}
