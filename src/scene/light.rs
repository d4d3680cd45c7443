use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use super::{
    wall::{SenseType, WallBlock},
    LightId, Placeable, Wall,
};
use crate::geometry::{
    polygon::circle_points,
    sweep::{sweep_polygon, Segment2},
    Bounds2,
};

/// Segments of the circle bounding a light's reach.
const LIGHT_CIRCLE_SEGMENTS: usize = 64;

/// A light source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    /// Scene-unique identifier.
    pub id: LightId,
    /// Position x.
    pub x: f64,
    /// Position y.
    pub y: f64,
    /// Elevation of the source.
    pub elevation: f64,
    /// Bright light radius.
    pub bright: f64,
    /// Dim light radius.
    pub dim: f64,
    /// Whether the light is on.
    pub active: bool,
    /// Linear RGB tint.
    pub color: [f32; 3],
}

impl Default for Light {
    fn default() -> Self {
        Self {
            id: LightId(0),
            x: 0.0,
            y: 0.0,
            elevation: 0.0,
            bright: 0.0,
            dim: 0.0,
            active: true,
            color: [1.0, 1.0, 1.0],
        }
    }
}

impl Light {
    /// An active white light at `(x, y)` reaching `radius`.
    #[must_use]
    pub fn new(id: LightId, x: f64, y: f64, radius: f64) -> Self {
        Self {
            id,
            x,
            y,
            bright: radius,
            dim: radius,
            ..Self::default()
        }
    }

    /// Source position.
    #[must_use]
    pub fn position(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.elevation)
    }

    /// Furthest distance the light reaches.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.bright.max(self.dim).max(0.0)
    }

    /// Illuminated region: a sweep from the source against light-blocking
    /// walls, bounded by the light's radius. Empty when the light is off or
    /// has no reach.
    #[must_use]
    pub fn illuminated_polygon<'a, I>(&self, walls: I) -> Vec<DVec2>
    where
        I: IntoIterator<Item = &'a Wall>,
    {
        let radius = self.radius();
        if !self.active || radius <= 0.0 {
            return Vec::new();
        }
        let origin = self.position();
        let segments: Vec<Segment2> = walls
            .into_iter()
            .filter(|w| w.block_for(origin, SenseType::Light) == WallBlock::Full)
            .map(|w| (w.a, w.b))
            .collect();
        let boundary = circle_points(origin.truncate(), radius, LIGHT_CIRCLE_SEGMENTS);
        sweep_polygon(origin.truncate(), &segments, &boundary)
    }
}

impl Placeable for Light {
    type Id = LightId;

    fn id(&self) -> LightId {
        self.id
    }

    fn bounds(&self) -> Bounds2 {
        Bounds2::new(
            DVec2::new(self.x, self.y),
            DVec2::new(self.x, self.y),
        )
        .expand(self.radius())
    }

    fn layer(scene: &super::Scene) -> &super::Layer<Self> {
        &scene.lights
    }

    fn layer_mut(scene: &mut super::Scene) -> &mut super::Layer<Self> {
        &mut scene.lights
    }
}

#[cfg(test)]
mod tests {
    use geo::Area;

    use super::*;
    use crate::{geometry::polygon::polygon_from_points, scene::WallId};

    #[test]
    fn unobstructed_light_is_a_disc() {
        let light = Light::new(LightId(1), 0.0, 0.0, 100.0);
        let ring = light.illuminated_polygon([]);
        let area = polygon_from_points(&ring).unsigned_area();
        let disc = std::f64::consts::PI * 100.0 * 100.0;
        assert!(area > disc * 0.99 && area <= disc, "area {area}");
    }

    #[test]
    fn inactive_light_is_dark() {
        let light = Light {
            active: false,
            ..Light::new(LightId(1), 0.0, 0.0, 100.0)
        };
        assert!(light.illuminated_polygon([]).is_empty());
    }

    #[test]
    fn wall_casts_shadow() {
        let light = Light::new(LightId(1), 0.0, 0.0, 100.0);
        let wall = Wall::new(WallId(1), DVec2::new(10.0, -200.0), DVec2::new(10.0, 200.0));
        let ring = light.illuminated_polygon([&wall]);
        assert!(ring.iter().all(|p| p.x <= 10.0 + 1e-6));
    }
}
