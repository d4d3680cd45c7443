use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::{Placeable, RegionId};
use crate::geometry::Bounds2;

/// A polygonal volume that can block sight (e.g. a fog bank or a pillar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Scene-unique identifier.
    pub id: RegionId,
    /// Footprint ring.
    pub shape: Vec<DVec2>,
    /// Bottom elevation.
    #[serde(default)]
    pub bottom: f64,
    /// Top elevation.
    #[serde(default)]
    pub top: f64,
    /// Whether the region blocks sight.
    #[serde(default)]
    pub blocks_sight: bool,
}

impl Region {
    /// A sight-blocking prism over `shape`.
    #[must_use]
    pub fn new(id: RegionId, shape: Vec<DVec2>, bottom: f64, top: f64) -> Self {
        Self {
            id,
            shape,
            bottom,
            top,
            blocks_sight: true,
        }
    }
}

impl Placeable for Region {
    type Id = RegionId;

    fn id(&self) -> RegionId {
        self.id
    }

    fn bounds(&self) -> Bounds2 {
        Bounds2::from_points(&self.shape).unwrap_or(Bounds2 {
            min: DVec2::ZERO,
            max: DVec2::ZERO,
        })
    }

    fn layer(scene: &super::Scene) -> &super::Layer<Self> {
        &scene.regions
    }

    fn layer_mut(scene: &mut super::Scene) -> &mut super::Layer<Self> {
        &mut scene.regions
    }
}
