use glam::{DVec2, DVec3};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Placeable, WallId};
use crate::geometry::{
    segment::{orientation, point_to_segment_distance_squared},
    Bounds2,
};

/// Finite stand-in for an unbounded wall elevation.
pub const WALL_HEIGHT_LIMIT: f64 = 1e5;

/// The sense a visibility test is run for. Walls restrict each independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SenseType {
    /// Vision.
    #[default]
    Sight,
    /// Light propagation.
    Light,
    /// Sound propagation.
    Sound,
}

/// How a wall restricts one sense.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SenseRestriction {
    /// Does not block.
    None,
    /// Terrain wall: blocks only where two or more are crossed.
    Limited,
    /// Blocks completely.
    #[default]
    Normal,
    /// Blocks unless the source is within `threshold` of the wall.
    Proximity {
        /// Distance in scene units.
        threshold: f64,
    },
    /// Blocks only while the source is within `threshold` of the wall.
    ReverseProximity {
        /// Distance in scene units.
        threshold: f64,
    },
}

/// Per-sense restrictions of a wall.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenseRestrictions {
    /// Restriction applied to sight.
    pub sight: SenseRestriction,
    /// Restriction applied to light.
    pub light: SenseRestriction,
    /// Restriction applied to sound.
    pub sound: SenseRestriction,
}

impl SenseRestrictions {
    /// The same restriction for every sense.
    #[must_use]
    pub const fn uniform(restriction: SenseRestriction) -> Self {
        Self {
            sight: restriction,
            light: restriction,
            sound: restriction,
        }
    }

    /// Restriction for one sense.
    #[must_use]
    pub const fn get(&self, sense: SenseType) -> SenseRestriction {
        match sense {
            SenseType::Sight => self.sight,
            SenseType::Light => self.light,
            SenseType::Sound => self.sound,
        }
    }
}

/// Which side of a wall blocks.
///
/// Sides are relative to the directed segment `a -> b`: "left" is the side
/// with positive orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WallDirection {
    /// Blocks from both sides.
    #[default]
    Both,
    /// Blocks only sources on the left of `a -> b`.
    Left,
    /// Blocks only sources on the right of `a -> b`.
    Right,
}

/// Door state of a wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    /// Not a door.
    #[default]
    None,
    /// Closed door; blocks like a wall.
    Closed,
    /// Open door; never blocks.
    Open,
    /// Locked door; blocks like a wall.
    Locked,
}

/// How a wall behaves for one source position and sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallBlock {
    /// Ignored for this test.
    None,
    /// Counts towards the two-terrain-wall rule.
    Terrain,
    /// Blocks outright.
    Full,
}

/// A wall segment with an optional elevation range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    /// Scene-unique identifier.
    pub id: WallId,
    /// First endpoint.
    pub a: DVec2,
    /// Second endpoint.
    pub b: DVec2,
    /// Bottom elevation; `None` extends downward without limit.
    #[serde(default)]
    pub bottom: Option<f64>,
    /// Top elevation; `None` extends upward without limit.
    #[serde(default)]
    pub top: Option<f64>,
    /// Sense restrictions.
    #[serde(default)]
    pub restrictions: SenseRestrictions,
    /// Blocking side.
    #[serde(default)]
    pub direction: WallDirection,
    /// Door state.
    #[serde(default)]
    pub door: DoorState,
}

impl Wall {
    /// A normal, bidirectional, unbounded wall.
    #[must_use]
    pub fn new(id: WallId, a: DVec2, b: DVec2) -> Self {
        Self {
            id,
            a,
            b,
            bottom: None,
            top: None,
            restrictions: SenseRestrictions::default(),
            direction: WallDirection::Both,
            door: DoorState::None,
        }
    }

    /// A wall that restricts every sense the same way.
    #[must_use]
    pub fn with_restriction(mut self, restriction: SenseRestriction) -> Self {
        self.restrictions = SenseRestrictions::uniform(restriction);
        self
    }

    /// Set the elevation range.
    #[must_use]
    pub fn with_elevation(mut self, bottom: Option<f64>, top: Option<f64>) -> Self {
        self.bottom = bottom;
        self.top = top;
        self
    }

    /// Set the blocking side.
    #[must_use]
    pub fn with_direction(mut self, direction: WallDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Bottom elevation clamped to a finite value. Non-finite values count
    /// as unbounded.
    #[must_use]
    pub fn bottom_z(&self) -> f64 {
        match self.bottom {
            Some(z) if z.is_finite() => z.max(-WALL_HEIGHT_LIMIT),
            _ => -WALL_HEIGHT_LIMIT,
        }
    }

    /// Top elevation clamped to a finite value.
    #[must_use]
    pub fn top_z(&self) -> f64 {
        match self.top {
            Some(z) if z.is_finite() => z.min(WALL_HEIGHT_LIMIT),
            _ => WALL_HEIGHT_LIMIT,
        }
    }

    /// Returns `true` if the wall's elevation range meets `[bottom, top]`.
    #[must_use]
    pub fn overlaps_elevation(&self, bottom: f64, top: f64) -> bool {
        self.bottom_z() <= top && self.top_z() >= bottom
    }

    /// Returns `true` if an open door or a `None` restriction makes the wall
    /// irrelevant for `sense` regardless of where the source stands.
    #[must_use]
    pub fn ignores(&self, sense: SenseType) -> bool {
        self.door == DoorState::Open
            || self.restrictions.get(sense) == SenseRestriction::None
            || self.a.distance_squared(self.b) == 0.0
    }

    /// Returns `true` if a one-sided wall faces away from `source`.
    #[must_use]
    pub fn faces_away_from(&self, source: DVec2) -> bool {
        let side = orientation(self.a, self.b, source);
        match self.direction {
            WallDirection::Both => false,
            WallDirection::Left => side < 0.0,
            WallDirection::Right => side > 0.0,
        }
    }

    /// How the wall treats `sense` emanating from `source`.
    #[must_use]
    pub fn block_for(&self, source: DVec3, sense: SenseType) -> WallBlock {
        if self.ignores(sense) || self.faces_away_from(source.truncate()) {
            return WallBlock::None;
        }
        let distance_sq = point_to_segment_distance_squared(source.truncate(), self.a, self.b);
        match self.restrictions.get(sense) {
            SenseRestriction::None => WallBlock::None,
            SenseRestriction::Limited => WallBlock::Terrain,
            SenseRestriction::Normal => WallBlock::Full,
            SenseRestriction::Proximity { threshold } => {
                if distance_sq <= threshold * threshold {
                    WallBlock::None
                } else {
                    WallBlock::Full
                }
            }
            SenseRestriction::ReverseProximity { threshold } => {
                if distance_sq <= threshold * threshold {
                    WallBlock::Full
                } else {
                    WallBlock::None
                }
            }
        }
    }
}

impl Placeable for Wall {
    type Id = WallId;

    fn id(&self) -> WallId {
        self.id
    }

    fn bounds(&self) -> Bounds2 {
        Bounds2::new(self.a, self.b)
    }

    fn layer(scene: &super::Scene) -> &super::Layer<Self> {
        &scene.walls
    }

    fn layer_mut(scene: &mut super::Scene) -> &mut super::Layer<Self> {
        &mut scene.walls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall() -> Wall {
        Wall::new(WallId(1), DVec2::new(0.0, -10.0), DVec2::new(0.0, 10.0))
    }

    #[test]
    fn open_doors_never_block() {
        let mut w = wall();
        w.door = DoorState::Open;
        assert_eq!(w.block_for(DVec3::new(-5.0, 0.0, 0.0), SenseType::Sight), WallBlock::None);
        w.door = DoorState::Locked;
        assert_eq!(w.block_for(DVec3::new(-5.0, 0.0, 0.0), SenseType::Sight), WallBlock::Full);
    }

    #[test]
    fn restriction_per_sense() {
        let mut w = wall();
        w.restrictions.sight = SenseRestriction::Limited;
        w.restrictions.sound = SenseRestriction::None;
        let src = DVec3::new(-5.0, 0.0, 0.0);
        assert_eq!(w.block_for(src, SenseType::Sight), WallBlock::Terrain);
        assert_eq!(w.block_for(src, SenseType::Light), WallBlock::Full);
        assert_eq!(w.block_for(src, SenseType::Sound), WallBlock::None);
    }

    #[test]
    fn proximity_thresholds() {
        let near = DVec3::new(-5.0, 0.0, 0.0);
        let far = DVec3::new(-50.0, 0.0, 0.0);
        let w = wall().with_restriction(SenseRestriction::Proximity { threshold: 10.0 });
        assert_eq!(w.block_for(near, SenseType::Sight), WallBlock::None);
        assert_eq!(w.block_for(far, SenseType::Sight), WallBlock::Full);
        let w = wall().with_restriction(SenseRestriction::ReverseProximity { threshold: 10.0 });
        assert_eq!(w.block_for(near, SenseType::Sight), WallBlock::Full);
        assert_eq!(w.block_for(far, SenseType::Sight), WallBlock::None);
    }

    #[test]
    fn one_sided_walls() {
        // a -> b points up (+y); left is -x.
        let w = wall().with_direction(WallDirection::Left);
        assert!(!w.faces_away_from(DVec2::new(-5.0, 0.0)));
        assert!(w.faces_away_from(DVec2::new(5.0, 0.0)));
        let w = wall().with_direction(WallDirection::Right);
        assert!(w.faces_away_from(DVec2::new(-5.0, 0.0)));
    }

    #[test]
    fn unbounded_elevation_is_clamped() {
        let w = wall().with_elevation(Some(f64::NAN), Some(20.0));
        assert_eq!(w.bottom_z(), -WALL_HEIGHT_LIMIT);
        assert_eq!(w.top_z(), 20.0);
        assert!(w.overlaps_elevation(10.0, 30.0));
        assert!(!w.overlaps_elevation(21.0, 30.0));
    }
}
