use std::sync::Arc;

use geo::{Area, Polygon};
use glam::DVec2;

use crate::{
    geometry::{
        polygon::{
            self, contains_point, polygon_bounds, polygon_from_points, polygon_points, AREA_EPSILON,
        },
        Bounds2,
    },
    mesh::{MeshCache, PlaceableMesh, TokenShape},
    options::LosOptions,
    scene::{Placeable, Scene, Token},
};

/// The part of the target that may count as visible.
#[derive(Debug, Clone, PartialEq)]
pub enum VisibleShape {
    /// The whole border.
    Full,
    /// Only this lit part of the border.
    Partial {
        /// Ring points, counter-clockwise.
        ring: Vec<DVec2>,
        /// The same ring as a polygon.
        polygon: Polygon<f64>,
    },
    /// Nothing is lit.
    Dark,
}

/// A target token's border and the subset of it that can be seen.
#[derive(Debug, Clone)]
pub struct TargetShape {
    /// The target token.
    pub token: Token,
    /// Border ring: the wall-constrained border when enabled and present,
    /// otherwise the rectangle.
    pub border: Vec<DVec2>,
    /// `border` as a polygon.
    pub border_polygon: Polygon<f64>,
    /// Bounding rectangle of the border.
    pub bounds: Bounds2,
    /// Bottom elevation.
    pub bottom: f64,
    /// Top elevation.
    pub top: f64,
    /// Whether `border` is wall-constrained.
    pub constrained: bool,
    /// Lit part of the border.
    pub visible: VisibleShape,
}

impl TargetShape {
    /// Resolve the border and visible shape of `target` in `scene`.
    #[must_use]
    pub fn build(scene: &Scene, target: &Token, options: &LosOptions) -> Self {
        let constrained_ring = if options.use_constrained_target_border {
            target.constrained_border(scene.walls().query(&target.bounds()))
        } else {
            None
        };
        let constrained = constrained_ring.is_some();
        let border = constrained_ring.unwrap_or_else(|| target.rectangle().to_vec());
        let border_polygon = polygon_from_points(&border);
        let bounds = polygon_bounds(&border_polygon).unwrap_or_else(|| target.bounds());
        let visible = if options.use_lit_target_shape && !scene.global_light() {
            lit_shape(scene, &border_polygon, &bounds)
        } else {
            VisibleShape::Full
        };
        Self {
            token: target.clone(),
            border,
            border_polygon,
            bounds,
            bottom: target.bottom_z(),
            top: target.top_z(),
            constrained,
            visible,
        }
    }

    /// Returns `true` if no part of the target is lit.
    #[must_use]
    pub fn is_dark(&self) -> bool {
        self.visible == VisibleShape::Dark
    }

    /// Returns `true` if only part (or none) of the border counts.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        self.visible != VisibleShape::Full
    }

    /// Whether `p` lies in the part of the target that may be seen.
    #[must_use]
    pub fn visible_contains(&self, p: DVec2) -> bool {
        match &self.visible {
            VisibleShape::Full => contains_point(&self.border_polygon, p),
            VisibleShape::Partial { polygon, .. } => contains_point(polygon, p),
            VisibleShape::Dark => false,
        }
    }

    /// Ring of the visible part, `None` when dark.
    #[must_use]
    pub fn visible_ring(&self) -> Option<&[DVec2]> {
        match &self.visible {
            VisibleShape::Full => Some(&self.border),
            VisibleShape::Partial { ring, .. } => Some(ring),
            VisibleShape::Dark => None,
        }
    }

    /// Mesh over the whole border.
    pub fn full_mesh(&self, cache: &mut MeshCache) -> Arc<PlaceableMesh> {
        if self.constrained {
            cache.token(&self.token, TokenShape::Constrained, Some(&self.border))
        } else {
            cache.token(&self.token, TokenShape::Rectangle, None)
        }
    }

    /// Mesh over the visible part, `None` when dark.
    pub fn visible_mesh(&self, cache: &mut MeshCache) -> Option<Arc<PlaceableMesh>> {
        match &self.visible {
            VisibleShape::Full => Some(self.full_mesh(cache)),
            VisibleShape::Partial { ring, .. } => {
                Some(cache.token(&self.token, TokenShape::Lit, Some(ring)))
            }
            VisibleShape::Dark => None,
        }
    }
}

/// Intersection of the border with every active light reaching it. Several
/// disjoint lit pieces collapse to their convex hull.
fn lit_shape(scene: &Scene, border: &Polygon<f64>, bounds: &Bounds2) -> VisibleShape {
    let lit = polygon::union_all(
        scene
            .lights()
            .query(bounds)
            .into_iter()
            .filter(|light| light.active)
            .map(|light| {
                let walls = scene.walls().query(&light.bounds());
                polygon_from_points(&light.illuminated_polygon(walls))
            }),
    );
    let clipped = polygon::clip(border, &lit);
    let lit_area = clipped.unsigned_area();
    if lit_area <= AREA_EPSILON {
        return VisibleShape::Dark;
    }
    let full_area = border.unsigned_area();
    if lit_area >= full_area - 1e-9 * full_area.max(1.0) {
        return VisibleShape::Full;
    }
    match polygon::single_polygon(&clipped) {
        Some(polygon) => VisibleShape::Partial {
            ring: polygon_points(&polygon),
            polygon,
        },
        None => VisibleShape::Dark,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Light, LightId, TokenId, Wall, WallId};

    fn scene() -> Scene {
        let mut scene = Scene::new(Bounds2::new(DVec2::splat(-1000.0), DVec2::splat(2000.0)));
        scene.set_global_light(false);
        scene
    }

    fn lit_options() -> LosOptions {
        LosOptions {
            use_lit_target_shape: true,
            ..LosOptions::default()
        }
    }

    #[test]
    fn unlit_scene_is_dark() {
        let target = Token::new(TokenId(2), 500.0, 0.0);
        let shape = TargetShape::build(&scene(), &target, &lit_options());
        assert!(shape.is_dark());
        assert!(!shape.visible_contains(DVec2::new(550.0, 50.0)));
    }

    #[test]
    fn global_light_ignores_lights() {
        let mut s = scene();
        s.set_global_light(true);
        let shape = TargetShape::build(&s, &Token::new(TokenId(2), 500.0, 0.0), &lit_options());
        assert_eq!(shape.visible, VisibleShape::Full);
    }

    #[test]
    fn light_covering_half_the_target() {
        let mut s = scene();
        let _ = s.upsert(Light::new(LightId(1), 350.0, 50.0, 210.0));
        let shape = TargetShape::build(&s, &Token::new(TokenId(2), 500.0, 0.0), &lit_options());
        assert!(shape.is_restricted());
        assert!(shape.visible_contains(DVec2::new(550.0, 50.0)));
        assert!(shape.visible_contains(DVec2::new(512.5, 12.5)));
        assert!(!shape.visible_contains(DVec2::new(587.5, 87.5)));
    }

    #[test]
    fn light_covering_everything_is_full() {
        let mut s = scene();
        let _ = s.upsert(Light::new(LightId(1), 550.0, 50.0, 500.0));
        let shape = TargetShape::build(&s, &Token::new(TokenId(2), 500.0, 0.0), &lit_options());
        assert_eq!(shape.visible, VisibleShape::Full);
    }

    #[test]
    fn crossing_wall_constrains_border() {
        let mut s = scene();
        let _ = s.upsert(Wall::new(WallId(1), DVec2::new(580.0, -50.0), DVec2::new(580.0, 150.0)));
        let target = Token::new(TokenId(2), 500.0, 0.0);
        let shape = TargetShape::build(&s, &target, &LosOptions::default());
        assert!(shape.constrained);
        assert!(shape.bounds.max.x <= 580.0 + 1e-6);

        let options = LosOptions {
            use_constrained_target_border: false,
            ..LosOptions::default()
        };
        let plain = TargetShape::build(&s, &target, &options);
        assert!(!plain.constrained);
        assert_eq!(plain.border.len(), 4);
    }
}
